//! Persisted models and mappers.

use std::sync::Arc;

/// A model stored under its own document id.
pub trait Identified {
    /// Returns the document id.
    fn id(&self) -> &str;
}

/// Maps a domain value to the model that is persisted for it.
pub type Mapper<D, M> = Arc<dyn Fn(&D) -> M + Send + Sync>;

/// Returns a mapper that persists the value itself.
pub fn identity<T: Clone + 'static>() -> Mapper<T, T> {
    Arc::new(T::clone)
}

/// Wraps a function as a mapper.
pub fn mapper<D, M, F>(f: F) -> Mapper<D, M>
where
    F: Fn(&D) -> M + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Profile {
        id: String,
        name: String,
    }

    impl Identified for Profile {
        fn id(&self) -> &str {
            &self.id
        }
    }

    #[test]
    fn test_identity() {
        let profile = Profile {
            id: "p1".into(),
            name: "Ada".into(),
        };
        let map = identity::<Profile>();
        assert_eq!(map(&profile), profile);
        assert_eq!(map(&profile).id(), "p1");
    }

    #[test]
    fn test_mapper() {
        let map = mapper(|p: &Profile| p.name.len());
        let profile = Profile {
            id: "p1".into(),
            name: "Ada".into(),
        };
        assert_eq!(map(&profile), 3);
    }
}
