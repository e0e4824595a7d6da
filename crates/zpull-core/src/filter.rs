//! Policy contracts consumed from the dataset mapping component.
//!
//! The rule language lives outside this crate. Endpoints only see the
//! boolean decision and ask for it again on every call.

use crate::error::ZpullResult;
use crate::path::DatasetPath;

/// Decides whether a dataset path may take part in replication.
pub trait DatasetFilter: Send + Sync {
    fn filter(&self, path: &DatasetPath) -> ZpullResult<bool>;
}

impl<F> DatasetFilter for F
where
    F: Fn(&DatasetPath) -> ZpullResult<bool> + Send + Sync,
{
    fn filter(&self, path: &DatasetPath) -> ZpullResult<bool> {
        self(path)
    }
}

/// Mapping policy defined in the push direction.
///
/// `inverted_filter` yields the pull-direction view: which paths may land in
/// the local tree.
pub trait DatasetMapping: Send + Sync {
    fn filter(&self, path: &DatasetPath) -> ZpullResult<bool>;

    fn inverted_filter(&self) -> ZpullResult<Box<dyn DatasetFilter>>;
}

/// Local pulls accept everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl DatasetFilter for AcceptAll {
    fn filter(&self, _path: &DatasetPath) -> ZpullResult<bool> {
        Ok(true)
    }
}

impl DatasetMapping for AcceptAll {
    fn filter(&self, _path: &DatasetPath) -> ZpullResult<bool> {
        Ok(true)
    }

    fn inverted_filter(&self) -> ZpullResult<Box<dyn DatasetFilter>> {
        Ok(Box::new(AcceptAll))
    }
}
