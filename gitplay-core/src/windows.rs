//! Floating file-tree and file-viewer windows.
//!
//! Each tree window owns its navigation path; nothing else about a window is
//! shared. Placement is view state kept beside the windows, not in them.

use crate::config::LayoutConfig;
use crate::models::{join_segments, path_segments, FileTree, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Reserved object id of the synthetic "up" entry in a listing.
pub const UP_ENTRY_ID: &str = "RELATIVE_ROOT_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowKind {
    FileTree { path: Vec<String> },
    FileViewer { file_path: String, object_id: ObjectId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub id: WindowId,
    pub kind: WindowKind,
    /// Focus recency; the highest stamp is on top.
    pub focus_stamp: u64,
}

impl Window {
    pub fn tree_path(&self) -> Option<&[String]> {
        match &self.kind {
            WindowKind::FileTree { path } => Some(path.as_slice()),
            WindowKind::FileViewer { .. } => None,
        }
    }

    /// Joined folder path of a tree window (`src/core/`, root `""`).
    pub fn folder(&self) -> Option<String> {
        self.tree_path().map(join_segments)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Into(String),
    Up,
}

/// A row of a tree window's directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub object_id: ObjectId,
    pub name: String,
    pub parent_path: String,
    pub is_directory: bool,
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn is_up(&self) -> bool {
        self.object_id == UP_ENTRY_ID
    }

    pub fn full_path(&self) -> String {
        format!("{}{}", self.parent_path, self.name)
    }

    /// What activating this entry in a listing does, if it navigates.
    pub fn navigation(&self) -> Option<Navigation> {
        if self.is_up() {
            Some(Navigation::Up)
        } else if self.is_directory {
            Some(Navigation::Into(self.name.clone()))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Cascading placement that only looks at the last placed window.
#[derive(Debug, Clone)]
pub struct Layout {
    config: LayoutConfig,
    last_placed: Option<Placement>,
    positions: HashMap<WindowId, Placement>,
}

impl Layout {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            last_placed: None,
            positions: HashMap::new(),
        }
    }

    pub fn set_container(&mut self, width: f64, height: f64) {
        self.config.container_width = width;
        self.config.container_height = height;
    }

    pub fn container(&self) -> (f64, f64) {
        (self.config.container_width, self.config.container_height)
    }

    /// Where a new `width`-wide window goes: right of the last placed window,
    /// or wrapped to the left edge when that would overflow the container.
    /// Both cases step down by the cascade offset.
    pub fn compute_initial_placement(&self, width: f64, _height: f64) -> (f64, f64) {
        let Some(last) = self.last_placed else {
            return (0.0, 0.0);
        };
        let y = last.y + self.config.cascade_offset;
        let x = last.x + last.width + self.config.gutter;
        if x + width > self.config.container_width {
            (0.0, y)
        } else {
            (x, y)
        }
    }

    /// Placement of `id`, computing and recording it the first time.
    pub fn place(&mut self, id: WindowId, width: f64, height: f64) -> Placement {
        if let Some(existing) = self.positions.get(&id) {
            return *existing;
        }
        let (x, y) = self.compute_initial_placement(width, height);
        let placement = Placement {
            x,
            y,
            width,
            height,
        };
        self.positions.insert(id, placement);
        self.last_placed = Some(placement);
        placement
    }

    /// Applies a drag, keeping the window inside the container.
    pub fn move_to(&mut self, id: WindowId, x: f64, y: f64) -> Option<Placement> {
        let (container_width, container_height) = self.container();
        let placement = self.positions.get_mut(&id)?;
        placement.x = x.min(container_width - placement.width).max(0.0);
        placement.y = y.min(container_height - placement.height).max(0.0);
        Some(*placement)
    }

    pub fn placement(&self, id: WindowId) -> Option<Placement> {
        self.positions.get(&id).copied()
    }

    fn forget(&mut self, id: WindowId) {
        self.positions.remove(&id);
    }
}

#[derive(Debug, Clone)]
pub struct WindowManager {
    windows: Vec<Window>,
    next_id: u64,
    focus_counter: u64,
    layout: Layout,
}

impl WindowManager {
    pub fn new(layout: LayoutConfig) -> Self {
        Self {
            windows: Vec::new(),
            next_id: 0,
            focus_counter: 0,
            layout: Layout::new(layout),
        }
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn get(&self, id: WindowId) -> Option<&Window> {
        self.windows.iter().find(|window| window.id == id)
    }

    fn get_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.iter_mut().find(|window| window.id == id)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut Layout {
        &mut self.layout
    }

    fn push(&mut self, kind: WindowKind) -> WindowId {
        let id = WindowId(self.next_id);
        self.next_id += 1;
        self.focus_counter += 1;
        self.windows.push(Window {
            id,
            kind,
            focus_stamp: self.focus_counter,
        });
        id
    }

    /// Opens a tree window at `path`, or focuses the window already showing
    /// that normalized path. Returns the window id and whether it is new.
    pub fn open_path(&mut self, path: &str) -> (WindowId, bool) {
        let segments = path_segments(path);
        let existing = self
            .windows
            .iter()
            .find(|window| window.tree_path() == Some(segments.as_slice()))
            .map(|window| window.id);

        match existing {
            Some(id) => {
                self.set_focus(id);
                (id, false)
            }
            None => (self.push(WindowKind::FileTree { path: segments }), true),
        }
    }

    pub fn open_viewer(&mut self, file_path: &str, object_id: &str) -> WindowId {
        let existing = self.viewer_for(file_path);
        match existing {
            Some(id) => {
                self.set_focus(id);
                id
            }
            None => self.push(WindowKind::FileViewer {
                file_path: file_path.to_string(),
                object_id: object_id.to_string(),
            }),
        }
    }

    pub fn viewer_for(&self, file_path: &str) -> Option<WindowId> {
        self.windows
            .iter()
            .find(|window| {
                matches!(
                    &window.kind,
                    WindowKind::FileViewer { file_path: p, .. } if p == file_path
                )
            })
            .map(|window| window.id)
    }

    pub fn close(&mut self, id: WindowId) -> Option<Window> {
        let position = self.windows.iter().position(|window| window.id == id)?;
        self.layout.forget(id);
        Some(self.windows.remove(position))
    }

    pub fn set_focus(&mut self, id: WindowId) -> bool {
        self.focus_counter += 1;
        let stamp = self.focus_counter;
        match self.get_mut(id) {
            Some(window) => {
                window.focus_stamp = stamp;
                true
            }
            None => false,
        }
    }

    /// Window ids from bottom to top.
    pub fn z_order(&self) -> Vec<WindowId> {
        let mut ordered: Vec<&Window> = self.windows.iter().collect();
        ordered.sort_by_key(|window| window.focus_stamp);
        ordered.into_iter().map(|window| window.id).collect()
    }

    pub fn focused(&self) -> Option<WindowId> {
        self.windows
            .iter()
            .max_by_key(|window| window.focus_stamp)
            .map(|window| window.id)
    }

    /// Moves a tree window into a subdirectory or up one level. Returns false
    /// when nothing changed: unknown window, not a directory in `tree`, or up
    /// at the root.
    pub fn navigate(
        &mut self,
        id: WindowId,
        navigation: Navigation,
        tree: Option<&FileTree>,
    ) -> bool {
        let Some(window) = self.get_mut(id) else {
            return false;
        };
        let WindowKind::FileTree { path } = &mut window.kind else {
            return false;
        };

        match navigation {
            Navigation::Up => path.pop().is_some(),
            Navigation::Into(segment) => {
                let parent = join_segments(path);
                let is_directory = tree
                    .map(|tree| tree.has_directory(&parent, &segment))
                    .unwrap_or(false);
                if is_directory {
                    path.push(segment);
                }
                is_directory
            }
        }
    }

    /// Listing of a tree window against `tree`: an "up" entry when below the
    /// root, then directories, then files, each sorted by name.
    pub fn listing(&self, id: WindowId, tree: Option<&FileTree>) -> Vec<TreeEntry> {
        let Some(path) = self.get(id).and_then(Window::tree_path) else {
            return Vec::new();
        };
        let Some(tree) = tree else {
            return Vec::new();
        };
        let parent = join_segments(path);

        let mut entries: Vec<TreeEntry> = tree
            .children(&parent)
            .map(|blob| TreeEntry {
                object_id: blob.object_id.clone(),
                name: blob.name.clone(),
                parent_path: blob.path.clone(),
                is_directory: blob.is_directory,
                size: blob.size,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.cmp(&b.name))
        });

        if !path.is_empty() {
            entries.insert(
                0,
                TreeEntry {
                    object_id: UP_ENTRY_ID.to_string(),
                    name: "..".to_string(),
                    parent_path: parent,
                    is_directory: true,
                    size: None,
                },
            );
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Blob;

    fn tree() -> FileTree {
        FileTree {
            root_id: "root".into(),
            blobs: vec![
                Blob::file("f0", "", "README.md", 10),
                Blob::directory("d1", "", "src"),
                Blob::directory("d0", "", "docs"),
                Blob::file("f1", "src/", "main.rs", 20),
                Blob::directory("d2", "src/", "core"),
                Blob::file("f2", "src/core/", "mod.rs", 5),
            ],
        }
    }

    fn manager() -> WindowManager {
        WindowManager::new(LayoutConfig::default())
    }

    #[test]
    fn test_placement_scenario() {
        let mut layout = Layout::new(LayoutConfig::default());
        let first = layout.place(WindowId(0), 280.0, 400.0);
        let second = layout.place(WindowId(1), 280.0, 400.0);
        let third = layout.place(WindowId(2), 280.0, 400.0);
        let fourth = layout.place(WindowId(3), 280.0, 400.0);

        assert_eq!((first.x, first.y), (0.0, 0.0));
        assert_eq!((second.x, second.y), (300.0, 30.0));
        assert_eq!((third.x, third.y), (600.0, 60.0));
        assert_eq!((fourth.x, fourth.y), (0.0, 90.0));
        assert_eq!(layout.place(WindowId(1), 999.0, 1.0), second);
    }

    #[test]
    fn test_move_is_clamped_to_container() {
        let mut layout = Layout::new(LayoutConfig::default());
        layout.place(WindowId(0), 280.0, 400.0);

        let moved = layout.move_to(WindowId(0), 900.0, -20.0).unwrap();
        assert_eq!((moved.x, moved.y), (720.0, 0.0));
        let moved = layout.move_to(WindowId(0), 100.0, 650.0).unwrap();
        assert_eq!((moved.x, moved.y), (100.0, 300.0));
        assert!(layout.move_to(WindowId(9), 0.0, 0.0).is_none());
    }

    #[test]
    fn test_open_path_dedupes_normalized_paths() {
        let mut windows = manager();
        let (first, created) = windows.open_path("src");
        assert!(created);
        let (second, created) = windows.open_path("/src/");
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(windows.windows().len(), 1);

        let (root, created) = windows.open_path("");
        assert!(created);
        assert_ne!(root, first);
    }

    #[test]
    fn test_focus_raises_window() {
        let mut windows = manager();
        let (a, _) = windows.open_path("");
        let (b, _) = windows.open_path("src");
        let (c, _) = windows.open_path("docs");
        assert_eq!(windows.z_order(), vec![a, b, c]);

        assert!(windows.set_focus(a));
        assert_eq!(windows.z_order(), vec![b, c, a]);
        assert_eq!(windows.focused(), Some(a));

        windows.open_path("src/");
        assert_eq!(windows.focused(), Some(b));
        assert!(!windows.set_focus(WindowId(42)));
    }

    #[test]
    fn test_navigation() {
        let tree = tree();
        let mut windows = manager();
        let (id, _) = windows.open_path("");

        assert!(!windows.navigate(id, Navigation::Up, Some(&tree)));
        assert!(!windows.navigate(id, Navigation::Into("README.md".into()), Some(&tree)));
        assert!(!windows.navigate(id, Navigation::Into("missing".into()), Some(&tree)));
        assert!(!windows.navigate(id, Navigation::Into("src".into()), None));

        assert!(windows.navigate(id, Navigation::Into("src".into()), Some(&tree)));
        assert!(windows.navigate(id, Navigation::Into("core".into()), Some(&tree)));
        assert_eq!(windows.get(id).unwrap().folder().unwrap(), "src/core/");

        assert!(windows.navigate(id, Navigation::Up, Some(&tree)));
        assert_eq!(windows.get(id).unwrap().folder().unwrap(), "src/");
    }

    #[test]
    fn test_navigation_is_private_per_window() {
        let tree = tree();
        let mut windows = manager();
        let (a, _) = windows.open_path("");
        let (b, _) = windows.open_path("src");

        windows.navigate(b, Navigation::Into("core".into()), Some(&tree));
        assert_eq!(windows.get(a).unwrap().folder().unwrap(), "");
        assert_eq!(windows.get(b).unwrap().folder().unwrap(), "src/core/");
    }

    #[test]
    fn test_listing_orders_entries_and_adds_up() {
        let tree = tree();
        let mut windows = manager();
        let (root, _) = windows.open_path("");
        let names: Vec<String> = windows
            .listing(root, Some(&tree))
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, vec!["docs", "src", "README.md"]);

        let (src, _) = windows.open_path("src");
        let listing = windows.listing(src, Some(&tree));
        assert!(listing[0].is_up());
        assert_eq!(listing[0].navigation(), Some(Navigation::Up));
        assert_eq!(listing[1].navigation(), Some(Navigation::Into("core".into())));
        assert_eq!(listing[2].full_path(), "src/main.rs");
        assert_eq!(listing[2].navigation(), None);

        assert!(windows.listing(src, None).is_empty());
    }

    #[test]
    fn test_viewers_share_focus_order() {
        let mut windows = manager();
        let (tree_window, _) = windows.open_path("");
        let viewer = windows.open_viewer("src/main.rs", "f1");
        assert_eq!(windows.open_viewer("src/main.rs", "f1"), viewer);
        assert_eq!(windows.viewer_for("src/main.rs"), Some(viewer));
        assert_eq!(windows.focused(), Some(viewer));
        assert!(windows.listing(viewer, None).is_empty());

        windows.layout_mut().place(viewer, 400.0, 300.0);
        let closed = windows.close(viewer).unwrap();
        assert_eq!(closed.id, viewer);
        assert!(windows.layout().placement(viewer).is_none());
        assert_eq!(windows.z_order(), vec![tree_window]);
    }
}
