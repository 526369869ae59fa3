/// Names short enough to live inside the linda itself.
const INLINE_CAP: usize = 23;

/// Linda name storage.
///
/// Most lindas are unnamed or carry a short debugging label, so the name is
/// embedded inline when it fits and heap-allocated only past [`INLINE_CAP`]
/// bytes.
#[derive(Clone)]
pub(crate) enum LindaName {
    Empty,
    Inline { len: u8, bytes: [u8; INLINE_CAP] },
    Heap(Box<str>),
}

impl LindaName {
    pub fn new(name: &str) -> LindaName {
        if name.is_empty() {
            LindaName::Empty
        } else if name.len() <= INLINE_CAP {
            let mut bytes = [0u8; INLINE_CAP];
            bytes[..name.len()].copy_from_slice(name.as_bytes());
            LindaName::Inline {
                len: name.len() as u8,
                bytes,
            }
        } else {
            LindaName::Heap(name.into())
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LindaName::Empty => None,
            LindaName::Inline { len, bytes } => {
                // the inline bytes are a whole &str copied in new()
                Some(unsafe { std::str::from_utf8_unchecked(&bytes[..*len as usize]) })
            }
            LindaName::Heap(name) => Some(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_is_distinct() {
        assert!(LindaName::new("").as_str().is_none());
    }

    #[test]
    fn short_names_stay_inline() {
        let name = LindaName::new("jobs");
        assert!(matches!(name, LindaName::Inline { .. }));
        assert_eq!(name.as_str(), Some("jobs"));

        let boundary = "x".repeat(INLINE_CAP);
        let name = LindaName::new(&boundary);
        assert!(matches!(name, LindaName::Inline { .. }));
        assert_eq!(name.as_str(), Some(boundary.as_str()));
    }

    #[test]
    fn long_names_go_to_the_heap() {
        let long = "x".repeat(INLINE_CAP + 1);
        let name = LindaName::new(&long);
        assert!(matches!(name, LindaName::Heap(_)));
        assert_eq!(name.as_str(), Some(long.as_str()));
    }

    #[test]
    fn multibyte_names_round_trip() {
        let name = LindaName::new("tüple");
        assert_eq!(name.as_str(), Some("tüple"));
    }
}
