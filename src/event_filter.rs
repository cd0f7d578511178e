use crate::event_record::DecodedEvent;

/// Selects decoded events by type code. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    event_types: Vec<u32>,
}

impl EventFilter {
    pub fn empty() -> Self {
        EventFilter::default()
    }

    pub fn new(event_types: impl IntoIterator<Item = u32>) -> Self {
        let mut event_types: Vec<u32> = event_types.into_iter().collect();
        event_types.sort_unstable();
        event_types.dedup();
        EventFilter { event_types }
    }

    pub fn is_empty(&self) -> bool {
        self.event_types.is_empty()
    }

    pub fn matches_type(&self, event_type: u32) -> bool {
        self.is_empty() || self.event_types.binary_search(&event_type).is_ok()
    }

    pub fn matches(&self, event: &DecodedEvent) -> bool {
        self.matches_type(event.event_type)
    }
}

impl FromIterator<u32> for EventFilter {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        EventFilter::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = EventFilter::empty();
        assert!(filter.matches_type(0));
        assert!(filter.matches_type(u32::MAX));
    }

    #[test]
    fn test_filter_matches_listed_types_only() {
        let filter: EventFilter = [15, 1, 15].into_iter().collect();
        assert!(filter.matches_type(1));
        assert!(filter.matches_type(15));
        assert!(!filter.matches_type(2));
        assert_eq!(filter, EventFilter::new([1, 15]));
    }
}
