//! Locations inside nested data, for error reporting.
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Ordered field/index steps from the root. Never mutated in place:
/// `concat`/`prepend` return a new path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<PathSegment>);

impl Path {
    pub fn empty() -> Self { Self(Vec::new()) }

    pub fn is_root(&self) -> bool { self.0.is_empty() }

    pub fn segments(&self) -> &[PathSegment] { &self.0 }

    /// `step` followed by `path`.
    pub fn concat(step: PathSegment, path: &Path) -> Self {
        let mut segments = Vec::with_capacity(path.0.len() + 1);
        segments.push(step);
        segments.extend(path.0.iter().cloned());
        Self(segments)
    }

    pub fn prepend(&self, step: PathSegment) -> Self { Self::concat(step, self) }

    pub fn field(name: impl Into<String>) -> Self { Self(vec![PathSegment::Field(name.into())]) }

    pub fn index(i: usize) -> Self { Self(vec![PathSegment::Index(i)]) }
}

impl From<Vec<PathSegment>> for Path {
    fn from(segments: Vec<PathSegment>) -> Self { Self(segments) }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, ".{name}"),
            PathSegment::Index(i) => write!(f, "[{i}]"),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("root");
        }
        for segment in &self.0 {
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fields_and_indices() {
        let p = Path::concat(
            PathSegment::Field("field".into()),
            &Path::concat(PathSegment::Index(2), &Path::field("other")),
        );
        assert_eq!(p.to_string(), ".field[2].other");
        assert_eq!(Path::empty().to_string(), "root");
    }

    #[test]
    fn concat_leaves_the_original_untouched() {
        let inner = Path::index(0);
        let outer = inner.prepend(PathSegment::Field("xs".into()));
        assert_eq!(inner, Path::index(0));
        assert_eq!(outer.segments().len(), 2);
        assert_eq!(outer, Path::concat(PathSegment::Field("xs".into()), &Path::index(0)));
    }
}
