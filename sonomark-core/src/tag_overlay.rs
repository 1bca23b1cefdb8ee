//! Tag chip placement and the cycling tag filter.
//!
//! Each visible annotation gets one cluster of chips stacked downward from
//! the top-left corner of its bounding box. Clusters of neighbouring
//! annotations may overlap; nothing is moved to avoid that.

use std::collections::BTreeSet;

use crate::annotation::{Annotation, AnnotationId, Tag};
use crate::config::OverlayConfig;
use crate::types::{Dimensions, Pixel, Window};

#[derive(Clone, Debug, PartialEq)]
pub struct ChipSlot {
    pub tag: Tag,
    /// Top-left of the chip. Chip width is left to the renderer's text
    /// measurement.
    pub origin: Pixel,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChipCluster {
    pub id: AnnotationId,
    pub anchor: Pixel,
    pub chips: Vec<ChipSlot>,
    /// Tags not shown because the cluster hit `max_chips`.
    pub hidden: usize,
}

pub fn layout(annotations: &[Annotation], window: &Window, dims: Dimensions, config: &OverlayConfig) -> Vec<ChipCluster> {
    let step = config.chip_height + config.chip_gap;
    annotations
        .iter()
        .filter(|a| !a.tags.is_empty())
        .filter_map(|a| {
            let anchored = a.geometry.is_in_window(window).and_then(|visible| {
                if visible {
                    a.geometry.anchor(window, dims).map(Some)
                } else {
                    Ok(None)
                }
            });
            match anchored {
                Ok(anchor) => anchor.map(|anchor| (a, anchor)),
                Err(e) => {
                    log::debug!("no chips for {}: {e}", a.id);
                    None
                }
            }
        })
        .map(|(a, anchor)| {
            let chips = a
                .tags
                .iter()
                .take(config.max_chips)
                .enumerate()
                .map(|(i, tag)| ChipSlot {
                    tag: tag.clone(),
                    origin: Pixel::new(anchor.x, anchor.y + i as f64 * step),
                })
                .collect();
            ChipCluster {
                id: a.id.clone(),
                anchor,
                chips,
                hidden: a.tags.len().saturating_sub(config.max_chips),
            }
        })
        .collect()
}

/// Optional tag that restricts sequential navigation. It never hides
/// annotations or chips.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TagFilter {
    current: Option<Tag>,
}

impl TagFilter {
    pub fn get(&self) -> Option<&Tag> {
        self.current.as_ref()
    }

    pub fn set(&mut self, tag: Option<Tag>) {
        self.current = tag;
    }

    pub fn matches(&self, annotation: &Annotation) -> bool {
        self.current.as_ref().map_or(true, |tag| annotation.has_tag(tag))
    }

    /// Advance through the distinct tags of `annotations` in sorted order,
    /// then back to no filter.
    pub fn cycle(&mut self, annotations: &[Annotation]) -> Option<&Tag> {
        let tags: BTreeSet<&Tag> = annotations.iter().flat_map(|a| a.tags.iter()).collect();
        let next = match &self.current {
            None => tags.iter().next().copied(),
            Some(current) => tags.iter().find(|t| **t > current).copied(),
        };
        self.current = next.cloned();
        self.current.as_ref()
    }
}
