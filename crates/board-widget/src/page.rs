//! The dashboard page: widget registry and grid free-space queries.

use board_proto::{BroadcastType, GridPos, GridSize, Reference, WidgetUniqueId};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::widget::Widget;

/// Errors surfaced by page operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    /// The widget is not registered on this page.
    #[error("widget {0} is not on the page")]
    UnknownWidget(WidgetUniqueId),
    /// The widget has no grid position.
    #[error("widget {0} has no position")]
    Unplaced(WidgetUniqueId),
    /// The position exceeds the page grid or overlaps another widget.
    #[error("position {pos:?} is not free")]
    PosNotFree {
        /// The rejected position.
        pos: GridPos,
    },
}

/// Result alias for page operations.
pub type PageResult<T> = Result<T, PageError>;

/// Options for [`DashboardPage::accommodate_pos`].
///
/// The reverse flags anchor the accommodation at the far edge of the
/// requested rectangle instead of its origin, matching a drag that grows
/// leftward or upward.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccommodateOptions {
    /// Anchor at the right edge.
    pub reverse_x: bool,
    /// Anchor at the bottom edge.
    pub reverse_y: bool,
    /// Widget whose current position is ignored by the free checks,
    /// normally the one being moved.
    pub exclude: Option<WidgetUniqueId>,
}

/// One page of a dashboard: an insertion-ordered widget collection on a
/// bounded grid.
pub struct DashboardPage {
    widgets: Vec<Widget>,
    max_columns: u32,
    max_rows: u32,
}

impl DashboardPage {
    /// Create an empty page with the given grid bounds.
    #[must_use]
    pub fn new(max_columns: u32, max_rows: u32) -> Self {
        Self {
            widgets: Vec::new(),
            max_columns,
            max_rows,
        }
    }

    /// Grid width in cells.
    #[must_use]
    pub fn max_columns(&self) -> u32 {
        self.max_columns
    }

    /// Grid height in cells.
    #[must_use]
    pub fn max_rows(&self) -> u32 {
        self.max_rows
    }

    /// Registered widgets, in insertion order.
    #[must_use]
    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    /// Look up a widget by its session-local id.
    #[must_use]
    pub fn widget(&self, unique_id: WidgetUniqueId) -> Option<&Widget> {
        self.widgets
            .iter()
            .find(|widget| widget.unique_id() == unique_id)
    }

    /// Register a placed widget. The position must be free.
    pub fn add_widget(&mut self, widget: Widget) -> PageResult<()> {
        let Some(pos) = widget.pos() else {
            return Err(PageError::Unplaced(widget.unique_id()));
        };
        if !self.is_pos_free(pos, None) {
            return Err(PageError::PosNotFree { pos });
        }
        debug!(widget = %widget.unique_id(), ?pos, "widget added to page");
        self.widgets.push(widget);
        Ok(())
    }

    /// Remove a widget from the page and hand it back to the caller,
    /// which decides whether to destroy it.
    pub fn remove_widget(&mut self, unique_id: WidgetUniqueId) -> PageResult<Widget> {
        let index = self
            .widgets
            .iter()
            .position(|widget| widget.unique_id() == unique_id)
            .ok_or(PageError::UnknownWidget(unique_id))?;
        debug!(widget = %unique_id, "widget removed from page");
        Ok(self.widgets.remove(index))
    }

    /// Swap a widget for a replacement occupying the same slot in the
    /// collection order. The replacement may reuse the original's
    /// position; any other overlap is rejected.
    pub fn replace_widget(
        &mut self,
        unique_id: WidgetUniqueId,
        replacement: Widget,
    ) -> PageResult<Widget> {
        let index = self
            .widgets
            .iter()
            .position(|widget| widget.unique_id() == unique_id)
            .ok_or(PageError::UnknownWidget(unique_id))?;
        let Some(pos) = replacement.pos() else {
            return Err(PageError::Unplaced(replacement.unique_id()));
        };
        if !self.is_pos_free(pos, Some(unique_id)) {
            return Err(PageError::PosNotFree { pos });
        }
        Ok(std::mem::replace(&mut self.widgets[index], replacement))
    }

    /// Whether the rectangle lies within the grid and overlaps no
    /// registered widget other than `exclude`.
    #[must_use]
    pub fn is_pos_free(&self, pos: GridPos, exclude: Option<WidgetUniqueId>) -> bool {
        if pos.width == 0
            || pos.height == 0
            || pos.right() > self.max_columns
            || pos.bottom() > self.max_rows
        {
            return false;
        }
        self.widgets
            .iter()
            .filter(|widget| Some(widget.unique_id()) != exclude)
            .filter_map(Widget::pos)
            .all(|occupied| !occupied.overlaps(&pos))
    }

    /// Find the first free position for a widget of the given size,
    /// scanning rows top to bottom and columns left to right.
    #[must_use]
    pub fn find_free_pos(&self, size: GridSize) -> Option<GridPos> {
        if size.width > self.max_columns || size.height > self.max_rows {
            return None;
        }
        for y in 0..=self.max_rows - size.height {
            for x in 0..=self.max_columns - size.width {
                let pos = GridPos::new(x, y, size.width, size.height);
                if self.is_pos_free(pos, None) {
                    return Some(pos);
                }
            }
        }
        None
    }

    /// Shrink a requested rectangle to the best free sub-rectangle.
    ///
    /// For each feasible width the height is maximized independently;
    /// among the variants, the one closest to the requested size wins,
    /// except that any variant wider than one cell beats every one-cell
    /// sliver. Returns `None` when not even the anchor cell is free.
    #[must_use]
    pub fn accommodate_pos(&self, pos: GridPos, options: AccommodateOptions) -> Option<GridPos> {
        let anchor_y = if options.reverse_y {
            pos.bottom() - 1
        } else {
            pos.y
        };
        let pos_x = self.accommodate_pos_x(
            GridPos::new(pos.x, anchor_y, pos.width, 1),
            options.reverse_x,
            options.exclude,
        )?;
        let pos_x = GridPos::new(pos_x.x, pos.y, pos_x.width, pos.height);

        let mut variants = Vec::new();
        for shrink in 0..pos_x.width {
            let candidate = if options.reverse_x {
                GridPos::new(pos_x.x + shrink, pos_x.y, pos_x.width - shrink, pos_x.height)
            } else {
                GridPos::new(pos_x.x, pos_x.y, pos_x.width - shrink, pos_x.height)
            };
            if let Some(variant) =
                self.accommodate_pos_y(candidate, options.reverse_y, options.exclude)
            {
                variants.push(variant);
            }
        }

        let mut best: Option<(GridPos, f64)> = None;
        for variant in variants {
            let delta_x = if options.reverse_x {
                f64::from(variant.x.abs_diff(pos.x))
            } else {
                f64::from(variant.width.abs_diff(pos.width))
            };
            let delta_y = if options.reverse_y {
                f64::from(variant.y.abs_diff(pos.y))
            } else {
                f64::from(variant.height.abs_diff(pos.height))
            };
            let value = delta_x.hypot(delta_y);

            let better = match best {
                None => true,
                Some((best_pos, best_value)) => {
                    (best_pos.width == 1 && variant.width > 1)
                        || ((best_pos.width > 1) == (variant.width > 1) && value < best_value)
                }
            };
            if better {
                best = Some((variant, value));
            }
        }
        best.map(|(pos, _)| pos)
    }

    /// Largest free horizontal run within the requested single-row span.
    fn accommodate_pos_x(
        &self,
        pos: GridPos,
        reverse: bool,
        exclude: Option<WidgetUniqueId>,
    ) -> Option<GridPos> {
        let mut max_pos = None;
        for width in 1..=pos.width {
            let candidate = if reverse {
                GridPos::new(pos.right() - width, pos.y, width, pos.height)
            } else {
                GridPos::new(pos.x, pos.y, width, pos.height)
            };
            if !self.is_pos_free(candidate, exclude) {
                break;
            }
            max_pos = Some(candidate);
        }
        max_pos
    }

    /// Largest free vertical extension of a candidate rectangle.
    fn accommodate_pos_y(
        &self,
        pos: GridPos,
        reverse: bool,
        exclude: Option<WidgetUniqueId>,
    ) -> Option<GridPos> {
        let mut max_pos = None;
        for height in 1..=pos.height {
            let candidate = if reverse {
                GridPos::new(pos.x, pos.bottom() - height, pos.width, height)
            } else {
                GridPos::new(pos.x, pos.y, pos.width, height)
            };
            if !self.is_pos_free(candidate, exclude) {
                break;
            }
            max_pos = Some(candidate);
        }
        max_pos
    }

    /// Choose a position for a new widget of the given default size.
    ///
    /// Every free rectangle no larger than the default size is
    /// considered; the one covering the largest fraction of the default
    /// size wins, ties broken topmost then leftmost. Rectangles below
    /// `min_size` are never returned. `None` means the page has no
    /// space.
    #[must_use]
    pub fn best_pos_for(&self, default_size: GridSize, min_size: GridSize) -> Option<GridPos> {
        let mut best: Option<GridPos> = None;

        for y in 0..self.max_rows {
            for x in 0..self.max_columns {
                let Some(candidate) = self.largest_fit_at(x, y, default_size, min_size) else {
                    continue;
                };
                let better = match best {
                    None => true,
                    // Scan order makes earlier candidates topmost then
                    // leftmost, so a tie never displaces the incumbent.
                    Some(best_pos) => candidate.area() > best_pos.area(),
                };
                if better {
                    best = Some(candidate);
                    if candidate.size() == default_size {
                        return best;
                    }
                }
            }
        }
        best
    }

    /// Largest rectangle anchored at `(x, y)`, capped at `default_size`
    /// and meeting `min_size`, that fits entirely in free space.
    fn largest_fit_at(
        &self,
        x: u32,
        y: u32,
        default_size: GridSize,
        min_size: GridSize,
    ) -> Option<GridPos> {
        let mut best: Option<GridPos> = None;
        for width in min_size.width..=default_size.width {
            for height in min_size.height..=default_size.height {
                let candidate = GridPos::new(x, y, width, height);
                if !self.is_pos_free(candidate, None) {
                    break;
                }
                if best.is_none_or(|best_pos| candidate.area() > best_pos.area()) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// Widgets that declare the given broadcast type and own a
    /// reference.
    #[must_use]
    pub fn widgets_by_broadcast_type(&self, broadcast_type: &BroadcastType) -> Vec<&Widget> {
        self.widgets
            .iter()
            .filter(|widget| widget.manifest().supports_broadcast(broadcast_type))
            .filter(|widget| widget.reference().is_some())
            .collect()
    }

    /// Widgets whose foreign-reference fields point at the given
    /// reference, with the affected field paths.
    #[must_use]
    pub fn listeners_of(&self, reference: &Reference) -> Vec<(&Widget, Vec<String>)> {
        self.widgets
            .iter()
            .filter_map(|widget| {
                let fields: Vec<String> = widget
                    .config()
                    .fields
                    .reference_fields_pointing_at(reference)
                    .map(|(name, _)| name.to_string())
                    .collect();
                (!fields.is_empty()).then_some((widget, fields))
            })
            .collect()
    }

    /// Allocate a broadcast reference not used by any widget on the
    /// page: five uppercase latin letters, regenerated on collision.
    #[must_use]
    pub fn allocate_reference(&self) -> Reference {
        loop {
            let bytes = *Uuid::new_v4().as_bytes();
            let candidate: String = bytes[..5]
                .iter()
                .map(|byte| char::from(b'A' + byte % 26))
                .collect();
            let reference = Reference::new(candidate);
            let taken = self
                .widgets
                .iter()
                .any(|widget| widget.reference() == Some(reference.clone()));
            if !taken {
                return reference;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use board_events::EventHub;
    use board_proto::{
        ContentRequest, ContentResponse, TransportError, TypedReference, WidgetConfig,
        WidgetFields, WidgetManifest,
    };
    use futures::FutureExt;

    use crate::content::ContentService;

    use super::*;

    struct StaticService;

    impl ContentService for StaticService {
        fn fetch(
            &self,
            request: ContentRequest,
        ) -> futures::future::BoxFuture<'static, Result<ContentResponse, TransportError>> {
            async move { Ok(ContentResponse::content(request.name, "<body/>")) }.boxed()
        }
    }

    fn widget(pos: GridPos) -> Widget {
        Widget::new(
            Arc::new(EventHub::new()),
            Arc::new(StaticService),
            WidgetManifest::new("clock", GridSize::new(4, 3), GridSize::new(1, 1)),
            WidgetConfig::new("clock"),
        )
        .with_pos(pos)
    }

    fn page_with(positions: &[GridPos]) -> DashboardPage {
        let mut page = DashboardPage::new(12, 8);
        for &pos in positions {
            page.add_widget(widget(pos)).unwrap();
        }
        page
    }

    #[test]
    fn add_rejects_overlap_and_out_of_bounds() {
        let mut page = page_with(&[GridPos::new(0, 0, 4, 3)]);

        let overlapping = GridPos::new(2, 2, 4, 3);
        assert_eq!(
            page.add_widget(widget(overlapping)),
            Err(PageError::PosNotFree { pos: overlapping })
        );

        let outside = GridPos::new(10, 0, 4, 3);
        assert_eq!(
            page.add_widget(widget(outside)),
            Err(PageError::PosNotFree { pos: outside })
        );

        assert_eq!(page.widgets().len(), 1);
    }

    #[test]
    fn remove_unknown_widget_is_an_error() {
        let mut page = page_with(&[]);
        let ghost = WidgetUniqueId::new();
        assert_eq!(page.remove_widget(ghost), Err(PageError::UnknownWidget(ghost)));
    }

    #[test]
    fn replace_keeps_the_slot_and_allows_reusing_the_pos() {
        let mut page = page_with(&[GridPos::new(0, 0, 4, 3), GridPos::new(4, 0, 4, 3)]);
        let first_id = page.widgets()[0].unique_id();

        let replacement = widget(GridPos::new(0, 0, 4, 3));
        let replacement_id = replacement.unique_id();
        let original = page.replace_widget(first_id, replacement).unwrap();

        assert_eq!(original.unique_id(), first_id);
        assert_eq!(page.widgets()[0].unique_id(), replacement_id);
        assert_eq!(page.widgets().len(), 2);
    }

    #[test]
    fn find_free_pos_scans_row_major() {
        let page = page_with(&[GridPos::new(0, 0, 8, 2)]);
        assert_eq!(
            page.find_free_pos(GridSize::new(4, 2)),
            Some(GridPos::new(8, 0, 4, 2))
        );

        let full_width = page_with(&[GridPos::new(0, 0, 12, 2)]);
        assert_eq!(
            full_width.find_free_pos(GridSize::new(4, 2)),
            Some(GridPos::new(0, 2, 4, 2))
        );

        assert_eq!(page_with(&[]).find_free_pos(GridSize::new(13, 2)), None);
    }

    #[test]
    fn accommodate_shrinks_to_the_free_sub_rectangle() {
        // A blocker occupies columns 6.. on rows 0..3.
        let page = page_with(&[GridPos::new(6, 0, 6, 3)]);

        let accommodated = page
            .accommodate_pos(GridPos::new(0, 0, 8, 3), AccommodateOptions::default())
            .unwrap();
        assert_eq!(accommodated, GridPos::new(0, 0, 6, 3));
    }

    #[test]
    fn accommodate_prefers_wider_variants_over_slivers() {
        // Only a single free column at x=0, but shrinking the height
        // instead keeps the full width.
        let page = page_with(&[GridPos::new(1, 1, 11, 7)]);

        let accommodated = page
            .accommodate_pos(GridPos::new(0, 0, 4, 4), AccommodateOptions::default())
            .unwrap();
        assert!(accommodated.width > 1);
        assert_eq!(accommodated, GridPos::new(0, 0, 4, 1));
    }

    #[test]
    fn accommodate_fails_when_the_anchor_is_occupied() {
        let page = page_with(&[GridPos::new(0, 0, 12, 8)]);
        assert_eq!(
            page.accommodate_pos(GridPos::new(0, 0, 4, 3), AccommodateOptions::default()),
            None
        );
    }

    #[test]
    fn best_pos_prefers_the_largest_fit_then_topmost() {
        // Free space: a 2x8 strip at x=10 and a 12x5 band below y=3.
        let page = page_with(&[GridPos::new(0, 0, 10, 3)]);

        // The band fits the full default size; the strip does not.
        let best = page.best_pos_for(GridSize::new(4, 3), GridSize::new(2, 2));
        assert_eq!(best, Some(GridPos::new(0, 3, 4, 3)));
    }

    #[test]
    fn best_pos_honors_the_minimum_size() {
        // Only a 1-cell-high band is free.
        let page = page_with(&[GridPos::new(0, 0, 12, 7)]);
        assert_eq!(
            page.best_pos_for(GridSize::new(4, 3), GridSize::new(2, 2)),
            None
        );
    }

    #[test]
    fn no_space_on_a_full_page() {
        let page = page_with(&[GridPos::new(0, 0, 12, 8)]);
        assert_eq!(
            page.best_pos_for(GridSize::new(4, 3), GridSize::new(1, 1)),
            None
        );
        assert_eq!(page.find_free_pos(GridSize::new(1, 1)), None);
    }

    #[test]
    fn listeners_and_broadcasters_are_enumerable() {
        let mut page = DashboardPage::new(12, 8);

        let nav = Widget::new(
            Arc::new(EventHub::new()),
            Arc::new(StaticService),
            WidgetManifest::new("navigator", GridSize::new(4, 3), GridSize::new(1, 1))
                .with_broadcast_type("_hostid"),
            WidgetConfig::new("navigator")
                .with_fields(WidgetFields::new().with_reference(Reference::new("NAV01"))),
        )
        .with_pos(GridPos::new(0, 0, 4, 3));
        let nav_id = nav.unique_id();
        page.add_widget(nav).unwrap();

        let listener = Widget::new(
            Arc::new(EventHub::new()),
            Arc::new(StaticService),
            WidgetManifest::new("honeycomb", GridSize::new(4, 3), GridSize::new(1, 1)),
            WidgetConfig::new("honeycomb").with_fields(WidgetFields::new().with_reference_field(
                "hostids",
                TypedReference::new(Reference::new("NAV01"), BroadcastType::new("_hostid")),
            )),
        )
        .with_pos(GridPos::new(4, 0, 4, 3));
        let listener_id = listener.unique_id();
        page.add_widget(listener).unwrap();

        let broadcasters = page.widgets_by_broadcast_type(&BroadcastType::new("_hostid"));
        assert_eq!(broadcasters.len(), 1);
        assert_eq!(broadcasters[0].unique_id(), nav_id);

        let listeners = page.listeners_of(&Reference::new("NAV01"));
        assert_eq!(listeners.len(), 1);
        assert_eq!(listeners[0].0.unique_id(), listener_id);
        assert_eq!(listeners[0].1, vec!["hostids".to_string()]);
    }

    #[test]
    fn allocated_references_are_unique_and_well_formed() {
        let mut page = DashboardPage::new(12, 8);
        let reference = page.allocate_reference();
        assert_eq!(reference.as_str().len(), 5);
        assert!(reference.as_str().chars().all(|c| c.is_ascii_uppercase()));

        let nav = Widget::new(
            Arc::new(EventHub::new()),
            Arc::new(StaticService),
            WidgetManifest::new("navigator", GridSize::new(4, 3), GridSize::new(1, 1)),
            WidgetConfig::new("navigator")
                .with_fields(WidgetFields::new().with_reference(reference.clone())),
        )
        .with_pos(GridPos::new(0, 0, 4, 3));
        page.add_widget(nav).unwrap();

        assert_ne!(page.allocate_reference(), reference);
    }
}
