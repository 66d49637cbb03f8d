//! WebAssembly entry point and browser host.
//!
//! The overlay is a fixed, viewport-sized container holding the live canvas;
//! the committed layer is an offscreen canvas the size of the document.
//! Pages drive it through [`InkmarkOverlay`] from their own toolbar.

use inkmark_core::input::UnknownPointerKind;
use inkmark_core::render::{Blend, FrameScheduler, RenderPipeline, StrokePaint, Surface};
use inkmark_core::{
    Annotator, AnnotatorConfig, KeyValueStorage, MemoryStorage, MouseButton, PointerEvent,
    PointerKind, PointerPhase, RenderError, Rgb, ScrollHost, StorageError, StorageResult,
    StrokeId, Tool,
};
use inkmark_render::RenderResult;
use kurbo::{Cap, Join, Point, Rect, Size, Vec2};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    CanvasRenderingContext2d, Document, Element, EventTarget, HtmlCanvasElement, HtmlElement,
    ScrollBehavior, ScrollToOptions, Window,
};

/// How often the page is re-measured to catch content that grows without
/// scrolling or resizing.
const VIEWPORT_POLL_MS: i32 = 250;

type WebAnnotator =
    Annotator<Canvas2dSurface, BrowserHost, AnimationFrames, Box<dyn KeyValueStorage>>;

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| js_error("No window"))
}

fn set_styles(element: &HtmlElement, styles: &[(&str, &str)]) -> Result<(), JsValue> {
    let style = element.style();
    for (name, value) in styles {
        style.set_property(name, value)?;
    }
    Ok(())
}

// --- Surface ---

/// HTML canvas with a 2D context.
pub struct Canvas2dSurface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    size: Size,
}

impl Canvas2dSurface {
    pub fn new(document: &Document) -> RenderResult<Self> {
        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(|e| RenderError::Surface(format!("{:?}", e)))?
            .dyn_into()
            .map_err(|_| RenderError::Surface("Element is not a canvas".to_string()))?;
        let ctx: CanvasRenderingContext2d = canvas
            .get_context("2d")
            .map_err(|e| RenderError::Surface(format!("{:?}", e)))?
            .ok_or_else(|| RenderError::Surface("2d context unavailable".to_string()))?
            .dyn_into()
            .map_err(|_| RenderError::Surface("Unexpected context type".to_string()))?;

        canvas.set_width(0);
        canvas.set_height(0);
        Ok(Self {
            canvas,
            ctx,
            size: Size::ZERO,
        })
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }
}

fn cap_name(cap: Cap) -> &'static str {
    match cap {
        Cap::Butt => "butt",
        Cap::Square => "square",
        Cap::Round => "round",
    }
}

fn join_name(join: Join) -> &'static str {
    match join {
        Join::Bevel => "bevel",
        Join::Miter => "miter",
        Join::Round => "round",
    }
}

impl Surface for Canvas2dSurface {
    fn resize(&mut self, size: Size) {
        // Setting either dimension clears the bitmap.
        self.canvas.set_width(size.width.max(0.0).round() as u32);
        self.canvas.set_height(size.height.max(0.0).round() as u32);
        self.size = size;
    }

    fn size(&self) -> Size {
        self.size
    }

    fn clear(&mut self) {
        self.ctx
            .clear_rect(0.0, 0.0, self.size.width, self.size.height);
    }

    fn stroke_polyline(&mut self, points: &[Point], paint: &StrokePaint) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        let ctx = &self.ctx;
        let mode = match paint.blend {
            Blend::Normal => "source-over",
            Blend::Darken => "darken",
        };
        let color = paint.color.to_string();

        ctx.save();
        if let Err(e) = ctx.set_global_composite_operation(mode) {
            log::warn!("Composite mode {} unsupported: {:?}", mode, e);
        }
        ctx.set_global_alpha(paint.alpha);
        ctx.begin_path();
        if rest.is_empty() {
            ctx.set_fill_style_str(&color);
            if ctx
                .arc(first.x, first.y, paint.width / 2.0, 0.0, std::f64::consts::TAU)
                .is_ok()
            {
                ctx.fill();
            }
        } else {
            ctx.set_stroke_style_str(&color);
            ctx.set_line_width(paint.width);
            ctx.set_line_cap(cap_name(paint.cap));
            ctx.set_line_join(join_name(paint.join));
            ctx.move_to(first.x, first.y);
            for p in rest {
                ctx.line_to(p.x, p.y);
            }
            ctx.stroke();
        }
        ctx.restore();
    }

    fn draw_region(&mut self, source: &Self, src_rect: Rect, dest_origin: Point) {
        let clipped = src_rect.intersect(source.size.to_rect());
        if clipped.is_zero_area() {
            return;
        }
        let dest = dest_origin + (clipped.origin() - src_rect.origin());
        if let Err(e) = self
            .ctx
            .draw_image_with_html_canvas_element_and_sw_and_sh_and_dx_and_dy_and_dw_and_dh(
                &source.canvas,
                clipped.x0,
                clipped.y0,
                clipped.width(),
                clipped.height(),
                dest.x,
                dest.y,
                clipped.width(),
                clipped.height(),
            )
        {
            log::warn!("Failed to copy committed layer: {:?}", e);
        }
    }
}

// --- Storage ---

/// `window.localStorage`.
pub struct LocalStorage {
    storage: web_sys::Storage,
}

impl LocalStorage {
    pub fn new(window: &Window) -> StorageResult<Self> {
        let storage = window
            .local_storage()
            .map_err(|e| StorageError::Unavailable(format!("{:?}", e)))?
            .ok_or_else(|| StorageError::Unavailable("localStorage is disabled".to_string()))?;
        Ok(Self { storage })
    }
}

impl KeyValueStorage for LocalStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| StorageError::Other(format!("Failed to read {}: {:?}", key, e)))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| StorageError::Unavailable(format!("Failed to write {}: {:?}", key, e)))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.storage
            .remove_item(key)
            .map_err(|e| StorageError::Other(format!("Failed to remove {}: {:?}", key, e)))
    }
}

// --- Frames ---

/// `requestAnimationFrame` scheduler.
///
/// The callback is bound after the annotator exists; a request made before
/// that is held and issued on bind. A request the browser rejects reports
/// failure so the pipeline does not wait for a frame that never comes.
pub struct AnimationFrames {
    window: Window,
    callback: Option<Closure<dyn FnMut(f64)>>,
    handle: Option<i32>,
    deferred: bool,
}

impl AnimationFrames {
    fn new(window: Window) -> Self {
        Self {
            window,
            callback: None,
            handle: None,
            deferred: false,
        }
    }

    /// Install the frame callback. Returns false if a held request could
    /// not be issued.
    fn bind(&mut self, callback: Closure<dyn FnMut(f64)>) -> bool {
        self.callback = Some(callback);
        if std::mem::take(&mut self.deferred) {
            return self.request_frame();
        }
        true
    }

    fn fired(&mut self) {
        self.handle = None;
    }
}

impl FrameScheduler for AnimationFrames {
    fn request_frame(&mut self) -> bool {
        let Some(callback) = &self.callback else {
            self.deferred = true;
            return true;
        };
        match self
            .window
            .request_animation_frame(callback.as_ref().unchecked_ref())
        {
            Ok(id) => {
                self.handle = Some(id);
                true
            }
            Err(e) => {
                log::warn!("requestAnimationFrame failed: {:?}", e);
                false
            }
        }
    }

    fn cancel_frame(&mut self) {
        self.deferred = false;
        if let Some(id) = self.handle.take() {
            if let Err(e) = self.window.cancel_animation_frame(id) {
                log::warn!("cancelAnimationFrame failed: {:?}", e);
            }
        }
    }
}

// --- Page ---

/// The browser window and the annotated element.
pub struct BrowserHost {
    window: Window,
    document: Document,
    target: HtmlElement,
}

fn scroll_extent(element: &Element) -> Size {
    Size::new(element.scroll_width() as f64, element.scroll_height() as f64)
}

impl ScrollHost for BrowserHost {
    fn viewport_size(&self) -> Size {
        let dimension = |value: Result<JsValue, JsValue>| {
            value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0)
        };
        Size::new(
            dimension(self.window.inner_width()),
            dimension(self.window.inner_height()),
        )
    }

    fn scroll_offset(&self) -> Vec2 {
        Vec2::new(
            self.window.scroll_x().unwrap_or(0.0),
            self.window.scroll_y().unwrap_or(0.0),
        )
    }

    fn content_sizes(&self) -> Vec<Size> {
        let mut sizes = Vec::with_capacity(3);
        if let Some(body) = self.document.body() {
            sizes.push(scroll_extent(&body));
        }
        if let Some(root) = self.document.document_element() {
            sizes.push(scroll_extent(&root));
        }
        sizes.push(scroll_extent(&self.target));
        sizes
    }

    fn scroll_by(&mut self, delta: Vec2) {
        self.window.scroll_by_with_x_and_y(delta.x, delta.y);
    }

    fn scroll_to(&mut self, position: Point, smooth: bool) {
        let options = ScrollToOptions::new();
        options.set_left(position.x);
        options.set_top(position.y);
        options.set_behavior(if smooth {
            ScrollBehavior::Smooth
        } else {
            ScrollBehavior::Auto
        });
        self.window.scroll_to_with_scroll_to_options(&options);
    }
}

// --- Input ---

fn pointer_event(event: &web_sys::PointerEvent, phase: PointerPhase) -> PointerEvent {
    let kind = event
        .pointer_type()
        .parse()
        .unwrap_or_else(|e: UnknownPointerKind| {
            log::debug!("{}", e);
            PointerKind::Touch
        });
    let timestamp = Duration::from_secs_f64(event.time_stamp().max(0.0) / 1000.0);
    let position = Point::new(event.client_x() as f64, event.client_y() as f64);

    let converted = PointerEvent::new(event.pointer_id(), kind, phase, position, timestamp);
    match phase {
        PointerPhase::Down => converted.with_button(MouseButton::from_dom(event.button())),
        _ => converted,
    }
}

/// Every intermediate position the browser merged into one move event.
fn coalesced_moves(event: &web_sys::PointerEvent) -> Vec<PointerEvent> {
    let mut moves: Vec<PointerEvent> = event
        .get_coalesced_events()
        .iter()
        .filter_map(|value| value.dyn_into::<web_sys::PointerEvent>().ok())
        .map(|e| pointer_event(&e, PointerPhase::Move))
        .collect();
    if moves.is_empty() {
        moves.push(pointer_event(event, PointerPhase::Move));
    }
    moves
}

/// Registered DOM listener, removed on drop.
struct Listener {
    target: EventTarget,
    kind: &'static str,
    closure: Closure<dyn FnMut(web_sys::Event)>,
}

impl Listener {
    fn attach(
        target: &EventTarget,
        kind: &'static str,
        handler: impl FnMut(web_sys::Event) + 'static,
    ) -> Result<Self, JsValue> {
        let closure = Closure::<dyn FnMut(web_sys::Event)>::new(handler);
        target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            kind,
            closure,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.kind, self.closure.as_ref().unchecked_ref());
    }
}

fn with_annotator(weak: &Weak<RefCell<WebAnnotator>>, f: impl FnOnce(&mut WebAnnotator)) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    match shared.try_borrow_mut() {
        Ok(mut annotator) => f(&mut annotator),
        Err(_) => log::warn!("Annotator busy, dropped a callback"),
    }
}

// --- Handle ---

/// Annotation overlay attached to the current page.
#[wasm_bindgen]
pub struct InkmarkOverlay {
    annotator: Rc<RefCell<WebAnnotator>>,
    window: Window,
    container: HtmlElement,
    canvas: HtmlCanvasElement,
    listeners: Vec<Listener>,
    poll: Option<(i32, Closure<dyn FnMut()>)>,
}

#[wasm_bindgen]
impl InkmarkOverlay {
    /// Attach to the element matching `target` (the body by default), with
    /// an optional JSON configuration.
    #[wasm_bindgen(constructor)]
    pub fn new(target: Option<String>, config: Option<String>) -> Result<InkmarkOverlay, JsValue> {
        let window = window()?;
        let document = window.document().ok_or_else(|| js_error("No document"))?;
        let body = document.body().ok_or_else(|| js_error("No document body"))?;
        let config = match config {
            Some(json) => AnnotatorConfig::from_json(&json).map_err(js_error)?,
            None => AnnotatorConfig::default(),
        };
        let target = match target {
            Some(selector) => document
                .query_selector(&selector)?
                .ok_or_else(|| js_error(format!("No element matches {}", selector)))?
                .dyn_into::<HtmlElement>()
                .map_err(|_| js_error(format!("{} is not an HTML element", selector)))?,
            None => body.clone(),
        };

        let container: HtmlElement = document
            .create_element("div")?
            .dyn_into()
            .map_err(|_| js_error("Failed to create overlay container"))?;
        set_styles(
            &container,
            &[
                ("position", "fixed"),
                ("top", "0"),
                ("left", "0"),
                ("width", "100vw"),
                ("height", "100vh"),
                ("pointer-events", "none"),
                ("z-index", "1000"),
                ("overflow", "hidden"),
            ],
        )?;

        let live = Canvas2dSurface::new(&document).map_err(js_error)?;
        let committed = Canvas2dSurface::new(&document).map_err(js_error)?;
        let canvas = live.canvas().clone();
        set_styles(
            &canvas,
            &[
                ("position", "absolute"),
                ("top", "0"),
                ("left", "0"),
                ("touch-action", "none"),
                ("pointer-events", "none"),
            ],
        )?;
        container.append_child(&canvas)?;
        body.append_child(&container)?;

        let storage: Box<dyn KeyValueStorage> = match LocalStorage::new(&window) {
            Ok(storage) => Box::new(storage),
            Err(e) => {
                log::warn!("{}; annotations will not persist", e);
                Box::new(MemoryStorage::new())
            }
        };
        let page = window.location().pathname()?;
        let host = BrowserHost {
            window: window.clone(),
            document,
            target,
        };
        let annotator = Annotator::new(
            config,
            &page,
            RenderPipeline::new(committed, live),
            host,
            AnimationFrames::new(window.clone()),
            storage,
        );
        let shared = Rc::new(RefCell::new(annotator));
        let weak = Rc::downgrade(&shared);

        let frame_weak = weak.clone();
        let on_frame = Closure::<dyn FnMut(f64)>::new(move |_time: f64| {
            with_annotator(&frame_weak, |annotator| {
                annotator.frames_mut().fired();
                annotator.on_animation_frame();
            });
        });
        {
            let mut annotator = shared.borrow_mut();
            if !annotator.frames_mut().bind(on_frame) {
                // Paint now; the held request was never scheduled
                annotator.on_animation_frame();
            }
        }

        let mut listeners = Vec::new();
        let canvas_target: &EventTarget = canvas.as_ref();
        for (kind, phase) in [
            ("pointerdown", PointerPhase::Down),
            ("pointermove", PointerPhase::Move),
            ("pointerup", PointerPhase::Up),
            ("pointercancel", PointerPhase::Cancel),
            ("pointerleave", PointerPhase::Leave),
        ] {
            let weak = weak.clone();
            let listener = Listener::attach(canvas_target, kind, move |event: web_sys::Event| {
                let Some(event) = event.dyn_ref::<web_sys::PointerEvent>() else {
                    return;
                };
                with_annotator(&weak, |annotator| {
                    if !annotator.is_active() {
                        return;
                    }
                    event.prevent_default();
                    match phase {
                        PointerPhase::Move => annotator.handle_pointer_batch(&coalesced_moves(event)),
                        _ => annotator.handle_pointer(&pointer_event(event, phase)),
                    }
                });
            })?;
            listeners.push(listener);
        }

        let window_target: &EventTarget = window.as_ref();
        for kind in ["scroll", "resize"] {
            let weak = weak.clone();
            let listener = Listener::attach(window_target, kind, move |_| {
                with_annotator(&weak, |annotator| {
                    annotator.on_viewport_tick();
                });
            })?;
            listeners.push(listener);
        }

        let poll_weak = weak;
        let poll = Closure::<dyn FnMut()>::new(move || {
            with_annotator(&poll_weak, |annotator| {
                annotator.on_viewport_tick();
            });
        });
        let poll_id = window.set_interval_with_callback_and_timeout_and_arguments_0(
            poll.as_ref().unchecked_ref(),
            VIEWPORT_POLL_MS,
        )?;

        log::info!("Overlay attached to {}", page);
        Ok(Self {
            annotator: shared,
            window,
            container,
            canvas,
            listeners,
            poll: Some((poll_id, poll)),
        })
    }

    fn sync_pointer_events(&self, active: bool) {
        let value = if active { "auto" } else { "none" };
        if let Err(e) = self.canvas.style().set_property("pointer-events", value) {
            log::warn!("Failed to update overlay: {:?}", e);
        }
    }

    #[wasm_bindgen(getter)]
    pub fn active(&self) -> bool {
        self.annotator.borrow().is_active()
    }

    pub fn set_active(&mut self, active: bool) {
        self.annotator.borrow_mut().set_mode_active(active);
        self.sync_pointer_events(active);
    }

    pub fn toggle_mode(&mut self) -> bool {
        let active = self.annotator.borrow_mut().toggle_mode();
        self.sync_pointer_events(active);
        active
    }

    #[wasm_bindgen(getter)]
    pub fn tool(&self) -> String {
        self.annotator.borrow().tool().name().to_string()
    }

    pub fn select_tool(&mut self, tool: &str) -> Result<(), JsValue> {
        let tool: Tool = tool.parse().map_err(js_error)?;
        self.annotator.borrow_mut().select_tool(tool);
        Ok(())
    }

    /// Current color of `tool` as `#rrggbb`; the eraser has none.
    pub fn color(&self, tool: &str) -> Result<Option<String>, JsValue> {
        let tool: Tool = tool.parse().map_err(js_error)?;
        Ok(self
            .annotator
            .borrow()
            .tools()
            .color(tool)
            .map(|c| c.to_string()))
    }

    pub fn set_color(&mut self, tool: &str, color: &str) -> Result<bool, JsValue> {
        let tool: Tool = tool.parse().map_err(js_error)?;
        let color: Rgb = color.parse().map_err(js_error)?;
        Ok(self.annotator.borrow_mut().set_color(tool, color))
    }

    pub fn line_width(&self, tool: &str) -> Result<f64, JsValue> {
        let tool: Tool = tool.parse().map_err(js_error)?;
        Ok(self.annotator.borrow().tools().line_width(tool))
    }

    /// Set the width of `tool`, clamped to its range. Returns the width applied.
    pub fn set_line_width(&mut self, tool: &str, width: f64) -> Result<f64, JsValue> {
        let tool: Tool = tool.parse().map_err(js_error)?;
        Ok(self.annotator.borrow_mut().set_line_width(tool, width))
    }

    /// Width for a slider dragged `delta_x` pixels from `start_width`.
    pub fn drag_line_width(
        &mut self,
        tool: &str,
        start_width: f64,
        delta_x: f64,
    ) -> Result<f64, JsValue> {
        let tool: Tool = tool.parse().map_err(js_error)?;
        Ok(self
            .annotator
            .borrow_mut()
            .drag_line_width(tool, start_width, delta_x))
    }

    /// Remove the last stroke; returns its id.
    pub fn undo(&mut self) -> Option<String> {
        self.annotator.borrow_mut().undo().map(|id| id.to_string())
    }

    /// Ask the user, then remove every annotation on the page.
    pub fn clear_all(&mut self) -> bool {
        let window = self.window.clone();
        self.annotator
            .borrow_mut()
            .clear_all(&mut |message: &str| window.confirm_with_message(message).unwrap_or(false))
    }

    pub fn scroll_to_stroke(&mut self, id: &str) -> Result<bool, JsValue> {
        let id: StrokeId = id.parse().map_err(js_error)?;
        Ok(self.annotator.borrow_mut().scroll_to_stroke(id))
    }

    #[wasm_bindgen(getter)]
    pub fn stroke_count(&self) -> usize {
        self.annotator.borrow().strokes().len()
    }

    /// Ids of committed strokes in paint order.
    pub fn stroke_ids(&self) -> Vec<String> {
        self.annotator
            .borrow()
            .strokes()
            .iter()
            .map(|s| s.id().to_string())
            .collect()
    }

    /// Detach from the page: stop listening, cancel pending work and remove
    /// the overlay.
    pub fn destroy(&mut self) {
        self.listeners.clear();
        if let Some((id, _poll)) = self.poll.take() {
            self.window.clear_interval_with_handle(id);
        }
        self.annotator.borrow_mut().shutdown();
        self.container.remove();
    }
}

/// Initialize logging for the WASM module.
#[wasm_bindgen(start)]
pub fn run_wasm() {
    console_error_panic_hook::set_once();

    if let Err(e) = console_log::init_with_level(log::Level::Info) {
        web_sys::console::warn_1(&JsValue::from_str(&e.to_string()));
    }

    log::info!("Starting inkmark (WASM)");
}
