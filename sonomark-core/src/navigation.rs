//! Next / previous annotation stepping.

use crate::annotation::{Annotation, AnnotationId};
use crate::tag_overlay::TagFilter;
use crate::types::Window;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NavigationTarget {
    pub id: AnnotationId,
    /// Where to centre the window, present only when the target is not
    /// already visible. Temporal geometries leave the frequency alone.
    pub center_on: Option<(f64, Option<f64>)>,
}

/// Annotations in visiting order: by start time, then id. With a filter,
/// only annotations carrying that tag. Geometry errors drop the annotation
/// from the order.
pub fn visiting_order<'a>(annotations: &'a [Annotation], filter: &TagFilter) -> Vec<(f64, &'a Annotation)> {
    let mut order: Vec<_> = annotations
        .iter()
        .filter(|a| filter.matches(a))
        .filter_map(|a| match a.geometry.start_time() {
            Ok(t) => Some((t, a)),
            Err(e) => {
                log::warn!("{} left out of navigation: {e}", a.id);
                None
            }
        })
        .collect();
    order.sort_by(|(ta, a), (tb, b)| ta.total_cmp(tb).then_with(|| a.id.cmp(&b.id)));
    order
}

/// Step from `current` in `direction`, wrapping at either end. When the
/// current annotation is not part of the order (filtered out or nothing
/// selected) the step starts from where it would sort.
pub fn navigate(
    annotations: &[Annotation],
    current: Option<&AnnotationId>,
    direction: Direction,
    filter: &TagFilter,
    window: &Window,
) -> Option<NavigationTarget> {
    let order = visiting_order(annotations, filter);
    if order.is_empty() {
        return None;
    }
    let current_key = current
        .and_then(|id| annotations.iter().find(|a| &a.id == id))
        .and_then(|a| a.geometry.start_time().ok().map(|t| (t, &a.id)));

    let index = match (current_key, direction) {
        (None, Direction::Next) => 0,
        (None, Direction::Previous) => order.len() - 1,
        (Some((t, id)), Direction::Next) => order
            .iter()
            .position(|(ot, oa)| ot.total_cmp(&t).then_with(|| oa.id.cmp(id)).is_gt())
            .unwrap_or(0),
        (Some((t, id)), Direction::Previous) => order
            .iter()
            .rposition(|(ot, oa)| ot.total_cmp(&t).then_with(|| oa.id.cmp(id)).is_lt())
            .unwrap_or(order.len() - 1),
    };

    let (_, target) = order[index];
    let visible = target.geometry.is_in_window(window).unwrap_or(false);
    let center_on = if visible {
        None
    } else {
        target.geometry.center().ok()
    };
    Some(NavigationTarget { id: target.id.clone(), center_on })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Tag;
    use crate::geometry::Geometry;
    use crate::types::Interval;

    fn tag() -> Tag {
        Tag::new("species", "Eptesicus")
    }

    fn only(tag: Tag) -> TagFilter {
        let mut filter = TagFilter::default();
        filter.set(Some(tag));
        filter
    }

    fn annotations() -> Vec<Annotation> {
        vec![
            Annotation::new("c", Geometry::TimeInterval([5.0, 6.0])).with_tags([tag()]),
            Annotation::new("a", Geometry::TimeStamp(1.0)),
            Annotation::new("b", Geometry::BoundingBox([1.0, 100.0, 2.0, 200.0])).with_tags([tag()]),
            Annotation::new("d", Geometry::Point([30.0, 500.0])),
        ]
    }

    fn window() -> Window {
        Window::new(Interval::new(0.0, 10.0), Interval::new(0.0, 1000.0))
    }

    fn walk(direction: Direction, filter: &TagFilter, steps: usize) -> Vec<String> {
        let anns = annotations();
        let mut current: Option<AnnotationId> = None;
        let mut seen = Vec::new();
        for _ in 0..steps {
            let target = navigate(&anns, current.as_ref(), direction, filter, &window()).unwrap();
            seen.push(target.id.0.clone());
            current = Some(target.id);
        }
        seen
    }

    #[test]
    fn visits_by_start_time_then_id_and_wraps() {
        assert_eq!(walk(Direction::Next, &TagFilter::default(), 5), vec!["a", "b", "c", "d", "a"]);
        assert_eq!(walk(Direction::Previous, &TagFilter::default(), 5), vec!["d", "c", "b", "a", "d"]);
    }

    #[test]
    fn filter_restricts_candidates() {
        assert_eq!(walk(Direction::Next, &only(tag()), 3), vec!["b", "c", "b"]);
    }

    #[test]
    fn filtered_out_current_steps_from_its_place() {
        let anns = annotations();
        let target = navigate(&anns, Some(&"a".into()), Direction::Next, &only(tag()), &window()).unwrap();
        assert_eq!(target.id, AnnotationId::from("b"));
    }

    #[test]
    fn recentres_only_when_off_screen() {
        let anns = annotations();
        let on_screen = navigate(&anns, Some(&"b".into()), Direction::Next, &TagFilter::default(), &window()).unwrap();
        assert_eq!(on_screen.center_on, None);
        let off_screen = navigate(&anns, Some(&"c".into()), Direction::Next, &TagFilter::default(), &window()).unwrap();
        assert_eq!(off_screen.center_on, Some((30.0, Some(500.0))));
    }

    #[test]
    fn nothing_to_visit() {
        assert!(navigate(&[], None, Direction::Next, &TagFilter::default(), &window()).is_none());
    }
}
