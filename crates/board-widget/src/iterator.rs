//! The iterator widget: a widget whose contents is a paged grid of
//! child widgets.

use std::sync::Arc;

use board_events::EventHub;
use board_proto::{GridPos, GridSize, WidgetConfig, WidgetManifest};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::content::ContentService;
use crate::lifecycle::WidgetState;
use crate::widget::{Widget, WidgetResult};

/// Errors specific to iterator widgets.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IteratorError {
    /// A page of children exceeds the configured grid capacity.
    #[error("{children} children exceed the {cells} grid cells")]
    TooManyChildren {
        /// Number of children supplied.
        children: usize,
        /// Grid capacity (`columns * rows`).
        cells: usize,
    },
}

/// Subdivide a `width x height` area into `columns x rows` cells that
/// tile it exactly.
///
/// Integer division leaves a remainder of `width mod columns` units; the
/// first that many columns are one unit wider than the rest, and likewise
/// for rows. Cells are returned in row-major order. `columns` and `rows`
/// are clamped to at least 1.
#[must_use]
pub fn grid_cells(size: GridSize, columns: u32, rows: u32) -> Vec<GridPos> {
    let columns = columns.max(1);
    let rows = rows.max(1);

    let cell_width_min = size.width / columns;
    let cell_height_min = size.height / rows;
    let extra_columns = size.width - cell_width_min * columns;
    let extra_rows = size.height - cell_height_min * rows;

    let mut cells = Vec::with_capacity((columns * rows) as usize);
    for index in 0..columns * rows {
        let col = index % columns;
        let row = index / columns;
        cells.push(GridPos::new(
            col * cell_width_min + col.min(extra_columns),
            row * cell_height_min + row.min(extra_rows),
            cell_width_min + u32::from(col < extra_columns),
            cell_height_min + u32::from(row < extra_rows),
        ));
    }
    cells
}

struct IteratorState {
    columns: u32,
    rows: u32,
    /// Minimum cell size below which updating is suspended.
    child_min_size: GridSize,
    children: Vec<Widget>,
    page: u32,
    page_count: u32,
}

impl IteratorState {
    fn cell_count(&self) -> usize {
        (self.columns.max(1) * self.rows.max(1)) as usize
    }

    fn is_too_small_for(&self, size: GridSize) -> bool {
        size.width / self.columns.max(1) < self.child_min_size.width
            || size.height / self.rows.max(1) < self.child_min_size.height
    }
}

/// A widget that renders a paged grid of child widgets inside its own
/// cell.
///
/// The child grid is `columns x rows` cells computed by [`grid_cells`];
/// each update cycle replaces the children wholesale with the current
/// page's set. Lifecycle transitions of the iterator cascade to its
/// children. When the iterator is resized so small that a child cell
/// would fall below the child minimum size, updating is suspended and
/// the children are hidden until it grows back.
pub struct IteratorWidget {
    base: Widget,
    state: Arc<Mutex<IteratorState>>,
}

impl IteratorWidget {
    /// Create an iterator widget in the [`WidgetState::Initial`] state.
    #[must_use]
    pub fn new(
        hub: Arc<EventHub>,
        service: Arc<dyn ContentService>,
        manifest: WidgetManifest,
        config: WidgetConfig,
        columns: u32,
        rows: u32,
        child_min_size: GridSize,
    ) -> Self {
        Self {
            base: Widget::new(hub, service, manifest, config),
            state: Arc::new(Mutex::new(IteratorState {
                columns: columns.max(1),
                rows: rows.max(1),
                child_min_size,
                children: Vec::new(),
                page: 1,
                page_count: 1,
            })),
        }
    }

    /// The iterator's own base widget handle.
    #[must_use]
    pub fn widget(&self) -> &Widget {
        &self.base
    }

    /// Current child widgets, in server-provided order.
    #[must_use]
    pub fn children(&self) -> Vec<Widget> {
        self.state.lock().children.clone()
    }

    /// Cell rectangles for the current size, row-major. Length is
    /// `columns * rows` regardless of how many children exist; cells
    /// beyond the children are placeholders.
    #[must_use]
    pub fn grid_pos(&self) -> Vec<GridPos> {
        let state = self.state.lock();
        grid_cells(self.contents_size(), state.columns, state.rows)
    }

    /// Whether the current size leaves any cell below the child minimum
    /// size. While too small, update cycles are suspended.
    #[must_use]
    pub fn is_too_small(&self) -> bool {
        self.state.lock().is_too_small_for(self.contents_size())
    }

    /// 1-based current page.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.state.lock().page
    }

    /// Total number of pages.
    #[must_use]
    pub fn page_count(&self) -> u32 {
        self.state.lock().page_count
    }

    fn contents_size(&self) -> GridSize {
        self.base
            .pos()
            .map_or(self.base.manifest().default_size, |pos| pos.size())
    }

    /// Enter the page. Children (none yet) arrive with the first update.
    pub fn start(&self) -> WidgetResult<()> {
        self.base.start()
    }

    /// Show the iterator and its children.
    pub fn activate(&self) -> WidgetResult<()> {
        self.base.activate()?;
        if self.is_too_small() {
            self.base.suspend_updating();
            return Ok(());
        }
        for child in self.children() {
            child.activate()?;
        }
        Ok(())
    }

    /// Hide the iterator and its children.
    pub fn deactivate(&self) -> WidgetResult<()> {
        self.base.deactivate()?;
        for child in self.children() {
            if child.state() == WidgetState::Active {
                child.deactivate()?;
            }
        }
        Ok(())
    }

    /// Permanently remove the iterator and all of its children.
    pub fn destroy(&self) -> WidgetResult<()> {
        self.base.destroy()?;
        let children = std::mem::take(&mut self.state.lock().children);
        for child in children {
            child.destroy()?;
        }
        Ok(())
    }

    /// Move or resize the iterator, re-laying out the children into the
    /// recomputed grid. Shrinking below the child minimum size suspends
    /// updating and hides the children; growing back resumes both.
    pub fn set_pos(&self, pos: GridPos) -> WidgetResult<()> {
        let was_too_small = self.is_too_small();
        self.base.set_pos(pos);
        let too_small = self.is_too_small();

        if too_small {
            debug!(widget = %self.base.unique_id(), "iterator too small, suspending updates");
            self.base.suspend_updating();
            for child in self.children() {
                if child.state() == WidgetState::Active {
                    child.deactivate()?;
                }
            }
            return Ok(());
        }

        self.layout_children();
        if was_too_small && self.base.state() == WidgetState::Active {
            for child in self.children() {
                if child.state() == WidgetState::Inactive {
                    child.activate()?;
                }
            }
            self.base.trigger_update()?;
        }
        Ok(())
    }

    /// Replace the children wholesale with the given page of widgets, in
    /// server-provided order. The previous children are destroyed. New
    /// children must be in the [`WidgetState::Initial`] state; they are
    /// started, laid out and, when the iterator is active, activated.
    pub fn apply_children(&self, children: Vec<Widget>) -> Result<(), IteratorError> {
        let cells = self.state.lock().cell_count();
        if children.len() > cells {
            return Err(IteratorError::TooManyChildren {
                children: children.len(),
                cells,
            });
        }

        let previous = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.children, children)
        };
        for child in previous {
            // Already-destroyed children were cleaned up by lifecycle
            // cascades; skip them.
            if child.state() != WidgetState::Destroyed {
                let _ = child.destroy();
            }
        }

        let activate = self.base.state() == WidgetState::Active && !self.is_too_small();
        for child in self.children() {
            let _ = child.start();
        }
        self.layout_children();
        if activate {
            for child in self.children() {
                let _ = child.activate();
            }
        }
        Ok(())
    }

    /// Update the total page count, clamping the current page into the
    /// new range.
    pub fn set_page_count(&self, page_count: u32) {
        let mut state = self.state.lock();
        state.page_count = page_count.max(1);
        state.page = state.page.min(state.page_count);
    }

    /// Jump to a page, clamped to `[1, page_count]`. A page change while
    /// active re-triggers the iterator's update cycle, which replaces
    /// the children with the new page's set.
    pub fn set_page(&self, page: u32) -> WidgetResult<()> {
        let changed = {
            let mut state = self.state.lock();
            let clamped = page.clamp(1, state.page_count);
            let changed = clamped != state.page;
            state.page = clamped;
            changed
        };
        if changed && self.base.state() == WidgetState::Active && !self.is_too_small() {
            self.base.trigger_update()?;
        }
        Ok(())
    }

    /// Advance one page. No-op on the last page.
    pub fn next_page(&self) -> WidgetResult<()> {
        let page = self.page();
        if page < self.page_count() {
            self.set_page(page + 1)?;
        }
        Ok(())
    }

    /// Go back one page. No-op on the first page.
    pub fn previous_page(&self) -> WidgetResult<()> {
        let page = self.page();
        if page > 1 {
            self.set_page(page - 1)?;
        }
        Ok(())
    }

    fn layout_children(&self) {
        let cells = self.grid_pos();
        let origin = self.base.pos().unwrap_or(GridPos::new(0, 0, 0, 0));
        for (child, cell) in self.children().into_iter().zip(cells) {
            child.set_pos(GridPos::new(
                origin.x + cell.x,
                origin.y + cell.y,
                cell.width,
                cell.height,
            ));
        }
    }
}
