use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::error::AssemblyError;
use crate::template::tree::Element;

/// Identifiers already consumed by a template
///
/// Collected from `Id` attributes, from `*Id` elements carrying a `Value`
/// attribute, and from `NextPointeeId` adjusted by one (Live stores the next
/// free value there, not the last used one).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateIdSet {
    ids: BTreeSet<i64>,
}

impl TemplateIdSet {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn min(&self) -> Option<i64> {
        self.ids.iter().next().copied()
    }

    pub fn max(&self) -> Option<i64> {
        self.ids.iter().next_back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.ids.iter().copied()
    }
}

impl FromIterator<i64> for TemplateIdSet {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Scan a template tree for every identifier in use, in one pass
///
/// Values that do not parse as integers are skipped.
pub fn scan_ids(root: &Element) -> TemplateIdSet {
    let mut ids = BTreeSet::new();

    root.visit(&mut |element| {
        if let Some(id) = parse_attr(element, "Id") {
            ids.insert(id);
        }

        if element.name.ends_with("Id") {
            if let Some(value) = parse_attr(element, "Value") {
                ids.insert(value);
                if element.name.ends_with("NextPointeeId") {
                    ids.insert(value.saturating_sub(1).max(0));
                }
            }
        }
    });

    let set = TemplateIdSet { ids };
    info!("📋 Extracted {} template IDs", set.len());
    if let (Some(min), Some(max)) = (set.min(), set.max()) {
        info!("   ID range: {} - {}", min, max);
    }
    set
}

fn parse_attr(element: &Element, key: &str) -> Option<i64> {
    element.attr(key).and_then(|value| value.trim().parse().ok())
}

/// Hands out identifiers above everything the template already uses
///
/// Owned by a single assembly run and threaded through it by `&mut`; the
/// sequence is deterministic for a fixed call order. `next_candidate` is
/// `None` once the `i64` space above the template is used up.
#[derive(Debug, Clone)]
pub struct SequentialIdAllocator {
    used: BTreeSet<i64>,
    next_candidate: Option<i64>,
    allocated: usize,
}

impl SequentialIdAllocator {
    pub fn new(template_ids: &TemplateIdSet) -> Self {
        let next_candidate = template_ids.max().unwrap_or(0).max(0).checked_add(1);
        match next_candidate {
            Some(start) => info!("🎯 Sequential allocator starts at ID: {}", start),
            None => warn!("Template already uses the largest possible ID, nothing left to allocate"),
        }

        Self {
            used: template_ids.ids.clone(),
            next_candidate,
            allocated: 0,
        }
    }

    /// Next free global identifier; never returns the same value twice
    pub fn allocate_global_id(&mut self) -> Result<i64, AssemblyError> {
        loop {
            let candidate = self.next_candidate.ok_or(AssemblyError::IdSpaceExhausted {
                allocated: self.allocated,
            })?;
            self.next_candidate = candidate.checked_add(1);
            if self.used.insert(candidate) {
                self.allocated += 1;
                return Ok(candidate);
            }
        }
    }

    /// Clip slot ids are per-track positions, not global identifiers
    pub fn allocate_local_slot_id(&self, position: usize) -> usize {
        position
    }

    /// Value for `NextPointeeId`: one above the highest identifier in use
    pub fn next_pointer_value(&self) -> i64 {
        self.used.iter().next_back().copied().unwrap_or(0).saturating_add(1)
    }

    /// Number of global identifiers handed out so far
    pub fn allocated_count(&self) -> usize {
        self.allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{template_xml, TEMPLATE_MAX_ID, TEMPLATE_NEXT_POINTEE};

    #[test]
    fn test_scan_collects_all_three_sources() {
        let root = Element::parse(
            r#"<Ableton>
                <NextPointeeId Value="100" />
                <Track Id="5"><PitchViewId Value="17" /><Other Id="abc" /></Track>
                <TrackGroupId Value="-1" />
            </Ableton>"#,
        )
        .unwrap();

        let ids = scan_ids(&root);
        assert!(ids.contains(5));
        assert!(ids.contains(17));
        assert!(ids.contains(99));
        assert!(ids.contains(-1));
        assert!(!ids.contains(0));
    }

    #[test]
    fn test_scan_fixture_template() {
        let root = Element::parse(&template_xml(true)).unwrap();
        let ids = scan_ids(&root);
        assert!(ids.contains(TEMPLATE_MAX_ID));
        assert!(ids.contains(TEMPLATE_NEXT_POINTEE - 1));
        assert_eq!(ids.max(), Some(TEMPLATE_NEXT_POINTEE));
    }

    #[test]
    fn test_next_pointee_of_zero_is_clamped() {
        let root = Element::parse(r#"<A><NextPointeeId Value="0" /></A>"#).unwrap();
        let ids = scan_ids(&root);
        assert_eq!(ids.iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_empty_template_starts_at_one() {
        let mut allocator = SequentialIdAllocator::new(&TemplateIdSet::default());
        assert_eq!(allocator.allocate_global_id().unwrap(), 1);
        assert_eq!(allocator.allocate_global_id().unwrap(), 2);
        assert_eq!(allocator.next_pointer_value(), 3);
        assert_eq!(allocator.allocated_count(), 2);
    }

    #[test]
    fn test_allocations_skip_used_and_never_repeat() {
        let template: TemplateIdSet = [3, 10, 11].into_iter().collect();
        let mut allocator = SequentialIdAllocator::new(&template);

        let allocated: Vec<i64> = (0..50).map(|_| allocator.allocate_global_id().unwrap()).collect();
        let distinct: BTreeSet<i64> = allocated.iter().copied().collect();

        assert_eq!(allocated[0], 12);
        assert_eq!(distinct.len(), allocated.len());
        assert!(allocated.iter().all(|id| !template.contains(*id)));
        assert_eq!(allocator.next_pointer_value(), allocated.iter().max().unwrap() + 1);
    }

    #[test]
    fn test_negative_only_template() {
        let template: TemplateIdSet = [-5, -1].into_iter().collect();
        let mut allocator = SequentialIdAllocator::new(&template);
        assert_eq!(allocator.allocate_global_id().unwrap(), 1);
    }

    #[test]
    fn test_slot_ids_are_positions() {
        let allocator = SequentialIdAllocator::new(&TemplateIdSet::default());
        assert_eq!(allocator.allocate_local_slot_id(0), 0);
        assert_eq!(allocator.allocate_local_slot_id(41), 41);
        assert_eq!(allocator.allocated_count(), 0);
    }

    #[test]
    fn test_smallest_next_pointee_does_not_overflow() {
        let root = Element::parse(r#"<A><NextPointeeId Value="-9223372036854775808" /></A>"#).unwrap();
        let ids = scan_ids(&root);
        assert!(ids.contains(i64::MIN));
        assert!(ids.contains(0));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_largest_template_id_exhausts_allocator() {
        let template: TemplateIdSet = [7, i64::MAX].into_iter().collect();
        let mut allocator = SequentialIdAllocator::new(&template);

        let err = allocator.allocate_global_id().unwrap_err();
        assert!(matches!(err, AssemblyError::IdSpaceExhausted { allocated: 0 }));
        assert_eq!(allocator.allocated_count(), 0);
        assert_eq!(allocator.next_pointer_value(), i64::MAX);
    }

    #[test]
    fn test_allocator_stops_at_top_of_id_space() {
        let template: TemplateIdSet = [i64::MAX - 2].into_iter().collect();
        let mut allocator = SequentialIdAllocator::new(&template);

        assert_eq!(allocator.allocate_global_id().unwrap(), i64::MAX - 1);
        assert_eq!(allocator.allocate_global_id().unwrap(), i64::MAX);
        assert!(allocator.allocate_global_id().is_err());
        assert!(allocator.allocate_global_id().is_err());
        assert_eq!(allocator.allocated_count(), 2);
    }
}
