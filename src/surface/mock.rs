//! Scriptable in-memory page for tests and demos.
//!
//! `MockPage` plays the role a real document bridge plays in production:
//! tests build a page, mutate it mid-run, and assert on mounted artifacts.
//! Handles are cheap clones sharing one underlying document, so a test can
//! keep scripting the page after handing a clone to the engine.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use super::{
    ElementId, ElementKind, Intensity, OverlayHandle, PageEvent, PageSurface, PixelBuffer, RectPx,
    SurfaceError,
};

/// One mounted obscuring artifact, exposed for test assertions.
#[derive(Debug, Clone)]
pub struct MountedArtifact {
    /// Surface-assigned handle.
    pub handle: OverlayHandle,
    /// Positioning context the artifact lives in.
    pub context: ElementId,
    /// Rectangle relative to the context.
    pub rect: RectPx,
    /// Requested blur strength.
    pub intensity: Intensity,
}

#[derive(Debug)]
struct MockNode {
    kind: Option<ElementKind>,
    parent: Option<ElementId>,
    attrs: HashMap<String, String>,
    rect: RectPx,
    natural: Option<(u32, u32)>,
    connected: bool,
    ready: bool,
    tainted: bool,
    positioning_context: bool,
}

#[derive(Debug)]
struct PageState {
    host: String,
    viewport: RectPx,
    nodes: BTreeMap<ElementId, MockNode>,
    artifacts: HashMap<OverlayHandle, MountedArtifact>,
    events: Vec<PageEvent>,
    next_node: u64,
    next_artifact: u64,
    root: ElementId,
}

/// In-memory [`PageSurface`] with a scripting API.
#[derive(Debug, Clone)]
pub struct MockPage {
    state: Rc<RefCell<PageState>>,
}

impl MockPage {
    /// Creates an empty page for `host` with a 1280x720 viewport.
    pub fn new(host: &str) -> Self {
        let viewport = RectPx::new(0.0, 0.0, 1280.0, 720.0);
        let root = ElementId::new(1);
        let mut nodes = BTreeMap::new();
        nodes.insert(
            root,
            MockNode {
                kind: None,
                parent: None,
                attrs: HashMap::new(),
                rect: viewport,
                natural: None,
                connected: true,
                ready: true,
                tainted: false,
                positioning_context: false,
            },
        );
        Self {
            state: Rc::new(RefCell::new(PageState {
                host: host.to_string(),
                viewport,
                nodes,
                artifacts: HashMap::new(),
                events: Vec::new(),
                next_node: 2,
                next_artifact: 1,
                root,
            })),
        }
    }

    /// The document root container.
    pub fn root(&self) -> ElementId {
        self.state.borrow().root
    }

    fn insert_node(
        &self,
        parent: ElementId,
        kind: Option<ElementKind>,
        rect: RectPx,
        attrs: &[(&str, &str)],
    ) -> ElementId {
        let mut state = self.state.borrow_mut();
        let id = ElementId::new(state.next_node);
        state.next_node += 1;
        state.nodes.insert(
            id,
            MockNode {
                kind,
                parent: Some(parent),
                attrs: attrs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                rect,
                natural: None,
                connected: true,
                ready: true,
                tainted: false,
                positioning_context: false,
            },
        );
        state.events.push(PageEvent::ElementAdded(id));
        id
    }

    /// Adds an image with a resolved `src` under the root.
    pub fn add_image(&self, rect: RectPx, src: &str) -> ElementId {
        self.insert_node(self.root(), Some(ElementKind::Image), rect, &[("src", src)])
    }

    /// Adds a video with a resolved `src` under the root.
    pub fn add_video(&self, rect: RectPx, src: &str) -> ElementId {
        self.insert_node(self.root(), Some(ElementKind::Video), rect, &[("src", src)])
    }

    /// Adds an image whose source only lives in a deferred attribute.
    pub fn add_lazy_image(&self, rect: RectPx, deferred_attr: &str, url: &str) -> ElementId {
        self.insert_node(
            self.root(),
            Some(ElementKind::Image),
            rect,
            &[(deferred_attr, url)],
        )
    }

    /// Adds a non-media container under `parent`.
    pub fn add_container(&self, parent: ElementId, rect: RectPx) -> ElementId {
        self.insert_node(parent, None, rect, &[])
    }

    /// Adds an image under an arbitrary parent.
    pub fn add_image_in(&self, parent: ElementId, rect: RectPx, src: &str) -> ElementId {
        self.insert_node(parent, Some(ElementKind::Image), rect, &[("src", src)])
    }

    /// Sets an attribute and records the change event.
    pub fn set_attribute(&self, id: ElementId, name: &str, value: &str) {
        let mut state = self.state.borrow_mut();
        if let Some(node) = state.nodes.get_mut(&id) {
            node.attrs.insert(name.to_string(), value.to_string());
            state.events.push(PageEvent::AttributeChanged {
                id,
                name: name.to_string(),
            });
        }
    }

    /// Moves or resizes an element and records a resize event.
    pub fn set_rect(&self, id: ElementId, rect: RectPx) {
        let mut state = self.state.borrow_mut();
        if let Some(node) = state.nodes.get_mut(&id) {
            node.rect = rect;
            state.events.push(PageEvent::ElementResized(id));
        }
    }

    /// Scrolls the page; rects shift, no events fire.
    ///
    /// Real engines fire neither mutation nor resize records for plain
    /// scrolling, which is exactly the case periodic realignment covers.
    pub fn scroll_by(&self, dx: f64, dy: f64) {
        let mut state = self.state.borrow_mut();
        for node in state.nodes.values_mut() {
            node.rect = node.rect.translated(-dx, -dy);
        }
    }

    /// Disconnects an element and its whole subtree, recording removals.
    pub fn remove_element(&self, id: ElementId) {
        let mut state = self.state.borrow_mut();
        let mut doomed = vec![id];
        let mut index = 0;
        while index < doomed.len() {
            let current = doomed[index];
            index += 1;
            let children: Vec<ElementId> = state
                .nodes
                .iter()
                .filter(|(_, n)| n.parent == Some(current) && n.connected)
                .map(|(child, _)| *child)
                .collect();
            doomed.extend(children);
        }
        for gone in &doomed {
            if let Some(node) = state.nodes.get_mut(gone) {
                if node.connected {
                    node.connected = false;
                    state.events.push(PageEvent::ElementRemoved(*gone));
                }
            }
        }
        state
            .artifacts
            .retain(|_, artifact| !doomed.contains(&artifact.context));
    }

    /// Marks whether the element has decodable content.
    pub fn set_ready(&self, id: ElementId, ready: bool) {
        if let Some(node) = self.state.borrow_mut().nodes.get_mut(&id) {
            node.ready = ready;
        }
    }

    /// Marks the element as security-tainted for sampling.
    pub fn set_tainted(&self, id: ElementId, tainted: bool) {
        if let Some(node) = self.state.borrow_mut().nodes.get_mut(&id) {
            node.tainted = tainted;
        }
    }

    /// Sets the element's intrinsic pixel dimensions.
    pub fn set_natural_size(&self, id: ElementId, width: u32, height: u32) {
        if let Some(node) = self.state.borrow_mut().nodes.get_mut(&id) {
            node.natural = Some((width, height));
        }
    }

    /// Pre-establishes a positioning context on the element.
    pub fn make_positioning_context(&self, id: ElementId) {
        if let Some(node) = self.state.borrow_mut().nodes.get_mut(&id) {
            node.positioning_context = true;
        }
    }

    /// Number of artifacts currently mounted.
    pub fn overlay_count(&self) -> usize {
        self.state.borrow().artifacts.len()
    }

    /// Snapshot of every mounted artifact.
    pub fn overlays(&self) -> Vec<MountedArtifact> {
        let mut all: Vec<MountedArtifact> =
            self.state.borrow().artifacts.values().cloned().collect();
        all.sort_by_key(|a| a.handle.raw());
        all
    }
}

/// Matches the tiny selector subset the mock understands:
/// `tag`, `[attr]`, and `tag[attr]`.
fn selector_matches(selector: &str, node: &MockNode) -> bool {
    let (tag, attr) = match selector.find('[') {
        Some(open) if selector.ends_with(']') => (
            &selector[..open],
            Some(&selector[open + 1..selector.len() - 1]),
        ),
        _ => (selector, None),
    };
    let tag_ok = match tag {
        "" => node.kind.is_some(),
        "video" => node.kind == Some(ElementKind::Video),
        "img" => node.kind == Some(ElementKind::Image),
        _ => false,
    };
    let attr_ok = attr.map_or(true, |name| node.attrs.contains_key(name));
    tag_ok && attr_ok
}

impl PageSurface for MockPage {
    fn page_host(&self) -> String {
        self.state.borrow().host.clone()
    }

    fn viewport(&self) -> RectPx {
        self.state.borrow().viewport
    }

    fn query(&self, selector: &str) -> Vec<ElementId> {
        self.state
            .borrow()
            .nodes
            .iter()
            .filter(|(_, n)| n.connected && selector_matches(selector, n))
            .map(|(id, _)| *id)
            .collect()
    }

    fn element_kind(&self, id: ElementId) -> Option<ElementKind> {
        self.state.borrow().nodes.get(&id).and_then(|n| n.kind)
    }

    fn attribute(&self, id: ElementId, name: &str) -> Option<String> {
        self.state
            .borrow()
            .nodes
            .get(&id)
            .and_then(|n| n.attrs.get(name))
            .filter(|v| !v.is_empty())
            .cloned()
    }

    fn bounding_rect(&self, id: ElementId) -> Option<RectPx> {
        let state = self.state.borrow();
        let node = state.nodes.get(&id)?;
        node.connected.then_some(node.rect)
    }

    fn natural_size(&self, id: ElementId) -> Option<(u32, u32)> {
        self.state.borrow().nodes.get(&id).and_then(|n| n.natural)
    }

    fn is_connected(&self, id: ElementId) -> bool {
        self.state
            .borrow()
            .nodes
            .get(&id)
            .is_some_and(|n| n.connected)
    }

    fn is_visible(&self, id: ElementId) -> bool {
        let state = self.state.borrow();
        state.nodes.get(&id).is_some_and(|n| {
            n.connected && !n.rect.is_empty() && n.rect.intersects(&state.viewport)
        })
    }

    fn is_ready(&self, id: ElementId) -> bool {
        self.state
            .borrow()
            .nodes
            .get(&id)
            .is_some_and(|n| n.connected && n.ready)
    }

    fn snapshot_pixels(&self, id: ElementId) -> Result<PixelBuffer, SurfaceError> {
        let state = self.state.borrow();
        let node = state.nodes.get(&id).ok_or(SurfaceError::Detached(id))?;
        if !node.connected {
            return Err(SurfaceError::Detached(id));
        }
        if !node.ready {
            return Err(SurfaceError::NotReady(id));
        }
        if node.tainted {
            return Err(SurfaceError::Tainted(id));
        }

        let (width, height) = node.natural.unwrap_or((
            (node.rect.width.max(1.0)) as u32,
            (node.rect.height.max(1.0)) as u32,
        ));
        // Deterministic per-element pattern, only for exercising the
        // sampler; content never matters to the pipeline itself.
        let seed = id.raw();
        let data: Vec<u8> = (0..(width as usize) * (height as usize) * 4)
            .map(|i| ((i as u64).wrapping_mul(31).wrapping_add(seed * 7) % 251) as u8)
            .collect();
        Ok(PixelBuffer {
            data,
            width,
            height,
        })
    }

    fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.state.borrow().nodes.get(&id).and_then(|n| n.parent)
    }

    fn is_positioning_context(&self, id: ElementId) -> bool {
        self.state
            .borrow()
            .nodes
            .get(&id)
            .is_some_and(|n| n.positioning_context)
    }

    fn ensure_positioning_context(&mut self, id: ElementId) {
        if let Some(node) = self.state.borrow_mut().nodes.get_mut(&id) {
            node.positioning_context = true;
        }
    }

    fn mount_overlay(
        &mut self,
        context: ElementId,
        rect: RectPx,
        intensity: Intensity,
    ) -> Result<OverlayHandle, SurfaceError> {
        let mut state = self.state.borrow_mut();
        if !state.nodes.get(&context).is_some_and(|n| n.connected) {
            return Err(SurfaceError::Detached(context));
        }
        let handle = OverlayHandle::new(state.next_artifact);
        state.next_artifact += 1;
        state.artifacts.insert(
            handle,
            MountedArtifact {
                handle,
                context,
                rect,
                intensity,
            },
        );
        Ok(handle)
    }

    fn update_overlay(&mut self, handle: OverlayHandle, rect: RectPx) {
        if let Some(artifact) = self.state.borrow_mut().artifacts.get_mut(&handle) {
            artifact.rect = rect;
        }
    }

    fn remove_overlay(&mut self, handle: OverlayHandle) {
        self.state.borrow_mut().artifacts.remove(&handle);
    }

    fn poll_events(&mut self) -> Vec<PageEvent> {
        std::mem::take(&mut self.state.borrow_mut().events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_by_tag_and_attribute() {
        let page = MockPage::new("example.com");
        let img = page.add_image(RectPx::new(0.0, 0.0, 200.0, 150.0), "https://x/a.jpg");
        let video = page.add_video(RectPx::new(0.0, 200.0, 640.0, 360.0), "https://x/v.mp4");
        let lazy = page.add_lazy_image(RectPx::new(0.0, 600.0, 200.0, 150.0), "data-src", "u");

        assert_eq!(page.query("img"), vec![img, lazy]);
        assert_eq!(page.query("video"), vec![video]);
        assert_eq!(page.query("[data-src]"), vec![lazy]);
        assert_eq!(page.query("img[data-src]"), vec![lazy]);
        assert!(page.query("iframe").is_empty());
    }

    #[test]
    fn test_events_drain_once() {
        let mut page = MockPage::new("example.com");
        let img = page.add_image(RectPx::new(0.0, 0.0, 100.0, 100.0), "u");
        page.set_attribute(img, "src", "u2");

        let events = page.poll_events();
        assert_eq!(events.len(), 2);
        assert!(page.poll_events().is_empty());
    }

    #[test]
    fn test_removal_disconnects_subtree_and_drops_artifacts() {
        let mut page = MockPage::new("example.com");
        let container = page.add_container(page.root(), RectPx::new(0.0, 0.0, 500.0, 500.0));
        let img = page.add_image_in(container, RectPx::new(10.0, 10.0, 100.0, 100.0), "u");
        let handle = page
            .mount_overlay(
                container,
                RectPx::new(10.0, 10.0, 100.0, 100.0),
                Intensity::Medium,
            )
            .unwrap();
        assert_eq!(page.overlay_count(), 1);

        page.remove_element(container);

        assert!(!page.is_connected(img));
        assert!(page.bounding_rect(img).is_none());
        assert_eq!(page.overlay_count(), 0);
        page.remove_overlay(handle); // gone already, must not panic
    }

    #[test]
    fn test_snapshot_error_cases() {
        let page = MockPage::new("example.com");
        let img = page.add_image(RectPx::new(0.0, 0.0, 8.0, 8.0), "u");

        assert!(page.snapshot_pixels(img).unwrap().is_valid());

        page.set_ready(img, false);
        assert!(matches!(
            page.snapshot_pixels(img),
            Err(SurfaceError::NotReady(_))
        ));

        page.set_ready(img, true);
        page.set_tainted(img, true);
        assert!(matches!(
            page.snapshot_pixels(img),
            Err(SurfaceError::Tainted(_))
        ));
    }

    #[test]
    fn test_scroll_moves_rects_without_events() {
        let mut page = MockPage::new("example.com");
        let img = page.add_image(RectPx::new(100.0, 700.0, 200.0, 150.0), "u");
        page.poll_events();

        page.scroll_by(0.0, 400.0);

        let rect = page.bounding_rect(img).unwrap();
        assert_eq!(rect.y, 300.0);
        assert!(page.poll_events().is_empty());
    }

    #[test]
    fn test_visibility_respects_viewport() {
        let page = MockPage::new("example.com");
        let above = page.add_image(RectPx::new(0.0, -500.0, 100.0, 100.0), "u");
        let inside = page.add_image(RectPx::new(0.0, 100.0, 100.0, 100.0), "u");

        assert!(!page.is_visible(above));
        assert!(page.is_visible(inside));
    }
}
