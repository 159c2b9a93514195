//! Browser bindings (wasm32)
//!
//! - `LocalStorage`: drafts in `window.localStorage`
//! - `DomForm`: the attempt `<form>` element
//! - `BrowserHost`: `setTimeout` debounce timers, XHR saves, editor flush
//! - editor detection: finds the editor library and subscribes its editors
//! - `init`: the JS entry point, returning an `AutosaveHandle`

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    Element, Event, EventTarget, HtmlFormElement, HtmlInputElement, HtmlOptionElement,
    HtmlSelectElement, HtmlTextAreaElement, UrlSearchParams, XmlHttpRequest,
};

use super::{
    Clock, EditorHost, SaveId, SaveTimer, SaveTransport, TimerId, TransportError, with_unborrowed,
};
use crate::autosave::Autosave;
use crate::config::AutosaveConfig;
use crate::detector::ChangeEvent;
use crate::editor::{ADD_EDITOR_HOOK, EDITOR_CHANGE_EVENTS};
use crate::form::{Control, FieldKind, Form, FormPayload};
use crate::persistence::{Storage, StorageError};

type WebAutosave = Autosave<DomForm, LocalStorage, BrowserHost>;

fn js_err(e: JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{:?}", e))
}

// === Storage ===

/// `window.localStorage`
pub struct LocalStorage {
    storage: web_sys::Storage,
}

impl LocalStorage {
    pub fn open() -> Result<Self, StorageError> {
        let window = web_sys::window().ok_or_else(|| StorageError::Unavailable("no window".into()))?;
        let storage = window
            .local_storage()
            .map_err(|e| StorageError::Unavailable(js_err(e)))?
            .ok_or_else(|| StorageError::Unavailable("localStorage disabled".into()))?;
        Ok(Self { storage })
    }
}

impl Storage for LocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage
            .get_item(key)
            .map_err(|e| StorageError::Unavailable(js_err(e)))
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage
            .set_item(key, value)
            .map_err(|e| StorageError::Rejected(js_err(e)))
    }
}

// === Form ===

/// The attempt `<form>` in the live document
pub struct DomForm {
    form: HtmlFormElement,
}

impl DomForm {
    pub fn find(form_id: &str) -> Option<Self> {
        let form = web_sys::window()?
            .document()?
            .get_element_by_id(form_id)?
            .dyn_into::<HtmlFormElement>()
            .ok()?;
        Some(Self { form })
    }

    fn elements(&self) -> Vec<Element> {
        let elements = self.form.elements();
        (0..elements.length()).filter_map(|i| elements.item(i)).collect()
    }

    fn inputs_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = HtmlInputElement> + 'a {
        self.elements()
            .into_iter()
            .filter_map(|el| el.dyn_into::<HtmlInputElement>().ok())
            .filter(move |input| input.name() == name)
    }

    fn select_named(&self, name: &str) -> Option<HtmlSelectElement> {
        self.elements()
            .into_iter()
            .filter_map(|el| el.dyn_into::<HtmlSelectElement>().ok())
            .find(|select| select.name() == name)
    }
}

/// Snapshot a form element as a control (None for non-controls)
fn control_of(element: &Element) -> Option<Control> {
    if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
        let mut control = Control::new(
            &input.name(),
            FieldKind::from_dom_type(&input.type_()),
            &input.value(),
        );
        control.checked = input.checked();
        control.disabled = input.disabled();
        return Some(control);
    }
    if let Some(textarea) = element.dyn_ref::<HtmlTextAreaElement>() {
        let mut control = Control::new(&textarea.name(), FieldKind::TextArea, &textarea.value());
        control.disabled = textarea.disabled();
        return Some(control);
    }
    if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
        let mut control = Control::new(
            &select.name(),
            FieldKind::from_dom_type(&select.type_()),
            &select.value(),
        );
        control.disabled = select.disabled();
        for option in options_of(select) {
            if control.kind == FieldKind::SelectMultiple && option.selected() {
                control.selected.push(option.value());
            }
            control.options.push(option.value());
        }
        return Some(control);
    }
    None
}

fn options_of(select: &HtmlSelectElement) -> impl Iterator<Item = HtmlOptionElement> + '_ {
    (0..select.length())
        .filter_map(|i| select.item(i))
        .filter_map(|el| el.dyn_into::<HtmlOptionElement>().ok())
}

impl Form for DomForm {
    fn controls(&self) -> Vec<Control> {
        self.elements().iter().filter_map(control_of).collect()
    }

    fn is_checked(&self, name: &str) -> bool {
        self.inputs_named(name)
            .find(|input| input.type_() == "checkbox")
            .map(|input| input.checked())
            .unwrap_or(false)
    }

    fn set_value(&mut self, name: &str, value: &str) {
        for element in self.elements() {
            if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
                if input.name() == name && FieldKind::from_dom_type(&input.type_()).is_text_like() {
                    input.set_value(value);
                    return;
                }
            } else if let Some(textarea) = element.dyn_ref::<HtmlTextAreaElement>() {
                if textarea.name() == name {
                    textarea.set_value(value);
                    return;
                }
            }
        }
        if let Some(input) = self
            .inputs_named(name)
            .find(|input| FieldKind::from_dom_type(&input.type_()) == FieldKind::Hidden)
        {
            input.set_value(value);
        }
    }

    fn set_checked(&mut self, name: &str, checked: bool) {
        if let Some(input) = self.inputs_named(name).find(|i| i.type_() == "checkbox") {
            input.set_checked(checked);
        }
    }

    fn check_radio(&mut self, name: &str, value: &str) -> bool {
        match self
            .inputs_named(name)
            .find(|i| i.type_() == "radio" && i.value() == value)
        {
            Some(input) => {
                input.set_checked(true);
                true
            }
            None => false,
        }
    }

    fn select_option(&mut self, name: &str, value: &str) -> bool {
        let Some(select) = self.select_named(name) else {
            return false;
        };
        let option = options_of(&select).find(|option| option.value() == value);
        match option {
            Some(option) => {
                option.set_selected(true);
                true
            }
            None => false,
        }
    }
}

/// Build a change event from the element an `input`/`change` event hit
fn change_event_of(target: &EventTarget, allow_textarea: bool, allow_select: bool) -> Option<ChangeEvent> {
    let element = target.dyn_ref::<Element>()?;
    let is_input = element.is_instance_of::<HtmlInputElement>();
    let is_textarea = element.is_instance_of::<HtmlTextAreaElement>();
    let is_select = element.is_instance_of::<HtmlSelectElement>();
    if !(is_input || (allow_textarea && is_textarea) || (allow_select && is_select)) {
        return None;
    }
    let control = control_of(element)?;
    if control.name.is_empty() {
        return None;
    }
    Some(ChangeEvent::from_control(&control))
}

// === Host ===

/// Timers, transport and editor access for one autosave instance
pub struct BrowserHost {
    this: Weak<RefCell<WebAutosave>>,
    handler_url: String,
    editor_global: String,
    end_time: Option<f64>,
    next_id: u32,
    /// Our timer id → browser timeout handle
    timers: HashMap<u32, i32>,
    requests: HashMap<u32, XmlHttpRequest>,
}

impl BrowserHost {
    fn new(this: Weak<RefCell<WebAutosave>>, config: &AutosaveConfig) -> Self {
        Self {
            this,
            handler_url: config.handler_url.clone(),
            editor_global: config.editor_global.clone(),
            end_time: None,
            next_id: 0,
            timers: HashMap::new(),
            requests: HashMap::new(),
        }
    }

    fn next(&mut self) -> u32 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }

    pub fn set_attempt_end(&mut self, end_ms: Option<f64>) {
        self.end_time = end_ms;
    }

    /// The editor library's global object, if loaded
    fn editor_library(&self) -> Option<JsValue> {
        let window = web_sys::window()?;
        let library = js_sys::Reflect::get(&window, &JsValue::from_str(&self.editor_global)).ok()?;
        (!library.is_undefined() && !library.is_null()).then_some(library)
    }

    fn timer_elapsed(&mut self, id: u32) {
        self.timers.remove(&id);
    }

    fn request_finished(&mut self, id: u32) {
        self.requests.remove(&id);
    }
}

/// Run `f` on the autosave instance if it is still alive and not busy
fn with_autosave<R>(
    this: &Weak<RefCell<WebAutosave>>,
    f: impl FnOnce(&mut WebAutosave) -> R,
) -> Option<R> {
    let this = this.upgrade()?;
    with_unborrowed(&this, f)
}

impl Clock for BrowserHost {
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }

    fn attempt_end_ms(&self) -> Option<f64> {
        self.end_time
    }
}

impl SaveTimer for BrowserHost {
    fn arm(&mut self, delay_ms: u64) -> TimerId {
        let id = self.next();
        let this = self.this.clone();
        let callback = Closure::once_into_js(move || {
            with_autosave(&this, |autosave| {
                autosave.host_mut().timer_elapsed(id);
                autosave.save_timer_fired(TimerId(id));
            });
        });
        let timeout = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        match web_sys::window().map(|w| {
            w.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), timeout)
        }) {
            Some(Ok(handle)) => {
                self.timers.insert(id, handle);
            }
            _ => log::warn!("Could not arm save timer"),
        }
        TimerId(id)
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(handle) = self.timers.remove(&id.0) {
            if let Some(window) = web_sys::window() {
                window.clear_timeout_with_handle(handle);
            }
        }
    }
}

impl SaveTransport for BrowserHost {
    fn submit(&mut self, payload: &FormPayload) -> Result<SaveId, TransportError> {
        let params = UrlSearchParams::new().map_err(|e| TransportError::Open(js_err(e)))?;
        for (name, value) in payload.pairs() {
            params.append(name, value);
        }
        let body = String::from(params.to_string());

        let xhr = XmlHttpRequest::new().map_err(|e| TransportError::Open(js_err(e)))?;
        xhr.open_with_async("POST", &self.handler_url, true)
            .map_err(|e| TransportError::Open(js_err(e)))?;
        xhr.set_request_header("Content-Type", "application/x-www-form-urlencoded")
            .map_err(|e| TransportError::Open(js_err(e)))?;

        let id = self.next();
        let this = self.this.clone();
        let on_done = Closure::once_into_js(move || {
            with_autosave(&this, |autosave| {
                autosave.host_mut().request_finished(id);
                autosave.save_completed(SaveId(id));
            });
        });
        xhr.set_onloadend(Some(on_done.unchecked_ref()));
        xhr.send_with_opt_str(Some(body.as_str()))
            .map_err(|e| TransportError::Send(js_err(e)))?;

        self.requests.insert(id, xhr);
        Ok(SaveId(id))
    }

    fn abort(&mut self, id: SaveId) {
        if let Some(xhr) = self.requests.remove(&id.0) {
            // abort() fires loadend synchronously; detach first
            xhr.set_onloadend(None);
            if let Err(e) = xhr.abort() {
                log::warn!("Could not abort save: {}", js_err(e));
            }
        }
    }
}

impl EditorHost for BrowserHost {
    fn flush_editors(&mut self) {
        let Some(library) = self.editor_library() else {
            return;
        };
        let trigger = js_sys::Reflect::get(&library, &JsValue::from_str("triggerSave"))
            .ok()
            .and_then(|f| f.dyn_into::<js_sys::Function>().ok());
        if let Some(trigger) = trigger {
            if let Err(e) = trigger.call0(&library) {
                log::warn!("Editor flush failed: {}", js_err(e));
            }
        }
    }
}

// === Entry point ===

/// Resolve after `ms` milliseconds on the page's event loop
async fn sleep(ms: u64) {
    let ms = i32::try_from(ms).unwrap_or(i32::MAX);
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        if let Some(window) = web_sys::window() {
            let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms);
        }
    });
    let _ = JsFuture::from(promise).await;
}

/// Re-read hidden fields forever, for as long as the instance lives
fn spawn_hidden_poll(this: Weak<RefCell<WebAutosave>>, interval_ms: u64) {
    spawn_local(async move {
        loop {
            sleep(interval_ms).await;
            if this.strong_count() == 0 {
                break;
            }
            with_autosave(&this, |autosave| {
                autosave.detect_hidden_field_changes();
            });
        }
    });
}

/// Outcome of one look for the editor library
enum Detection {
    Pending,
    Found(JsValue),
    Resolved,
}

/// Look for the editor library `repeats` times, `interval_ms` apart, then
/// give up. Once found, hook it so new editors get subscribed.
fn spawn_editor_detection(this: Weak<RefCell<WebAutosave>>, interval_ms: u64, repeats: u32) {
    spawn_local(async move {
        for attempt in 0..repeats {
            if attempt > 0 {
                sleep(interval_ms).await;
            }
            let detection = with_autosave(&this, |autosave| {
                if !autosave.editors().is_waiting() {
                    return Detection::Resolved;
                }
                let library = autosave.host().editor_library();
                match library {
                    Some(library) if autosave.editor_library_ready() => Detection::Found(library),
                    Some(_) => Detection::Resolved,
                    None => Detection::Pending,
                }
            });
            match detection {
                Some(Detection::Found(library)) => {
                    hook_editor_library(&library, &this);
                    return;
                }
                Some(Detection::Resolved) => return,
                Some(Detection::Pending) => {}
                None if this.strong_count() == 0 => return,
                None => {}
            }
        }
        with_autosave(&this, |autosave| autosave.editor_detection_finished());
    });
}

/// Call `target[method](...args)`
fn call_method(target: &JsValue, method: &str, args: &[&JsValue]) -> Result<JsValue, JsValue> {
    let function = js_sys::Reflect::get(target, &JsValue::from_str(method))?
        .dyn_into::<js_sys::Function>()?;
    function.apply(target, &args.iter().copied().collect::<js_sys::Array>())
}

fn has_method(target: &JsValue, method: &str) -> bool {
    js_sys::Reflect::get(target, &JsValue::from_str(method))
        .map(|f| f.is_function())
        .unwrap_or(false)
}

/// Subscribe existing editors and every editor the library creates later
fn hook_editor_library(library: &JsValue, this: &Weak<RefCell<WebAutosave>>) {
    let (dispatcher_name, event_name) = ADD_EDITOR_HOOK;
    let dispatcher = js_sys::Reflect::get(library, &JsValue::from_str(dispatcher_name))
        .ok()
        .filter(|d| has_method(d, "add"));
    let hooked = if let Some(dispatcher) = dispatcher {
        // Older libraries: dispatcher.add(fn(manager, editor))
        let this = this.clone();
        let handler =
            Closure::<dyn FnMut(JsValue, JsValue)>::new(move |_manager: JsValue, editor: JsValue| {
                subscribe_editor(&editor, &this);
            });
        let result = call_method(&dispatcher, "add", &[handler.as_ref()]);
        handler.forget();
        result
    } else {
        // Newer libraries: library.on("AddEditor", fn({ editor }))
        let this = this.clone();
        let handler = Closure::<dyn FnMut(JsValue)>::new(move |event: JsValue| {
            if let Ok(editor) = js_sys::Reflect::get(&event, &JsValue::from_str("editor")) {
                subscribe_editor(&editor, &this);
            }
        });
        let event = JsValue::from_str(event_name);
        let result = call_method(library, "on", &[&event, handler.as_ref()]);
        handler.forget();
        result
    };
    if let Err(e) = hooked {
        log::warn!("Could not watch for new editors: {}", js_err(e));
    }

    // Editors created before the hook was attached
    let existing = js_sys::Reflect::get(library, &JsValue::from_str("editors")).ok();
    if let Some(editors) = existing.as_ref().and_then(|e| e.dyn_ref::<js_sys::Object>()) {
        for editor in js_sys::Object::values(editors).iter() {
            subscribe_editor(&editor, this);
        }
    }
}

/// Register an editor instance and forward its change notifications
fn subscribe_editor(editor: &JsValue, this: &Weak<RefCell<WebAutosave>>) {
    let Some(id) = js_sys::Reflect::get(editor, &JsValue::from_str("id"))
        .ok()
        .and_then(|id| id.as_string())
    else {
        return;
    };
    if !with_autosave(this, |autosave| autosave.register_editor(&id)).unwrap_or(false) {
        return;
    }

    for (event_name, dispatcher_name) in EDITOR_CHANGE_EVENTS {
        let handler = {
            let this = this.clone();
            let id = id.clone();
            let editor = editor.clone();
            Closure::<dyn FnMut()>::new(move || {
                let content = match call_method(&editor, "getContent", &[]) {
                    Ok(content) => content.as_string().unwrap_or_default(),
                    Err(e) => {
                        log::warn!("Could not read editor {}: {}", id, js_err(e));
                        return;
                    }
                };
                with_autosave(&this, |autosave| autosave.editor_changed(&id, &content));
            })
        };
        let dispatcher = js_sys::Reflect::get(editor, &JsValue::from_str(dispatcher_name))
            .ok()
            .filter(|d| has_method(d, "add"));
        let subscribed = match dispatcher {
            Some(dispatcher) => call_method(&dispatcher, "add", &[handler.as_ref()]),
            None => call_method(editor, "on", &[&JsValue::from_str(event_name), handler.as_ref()]),
        };
        if let Err(e) = subscribed {
            log::warn!("Could not watch editor {} for {}: {}", id, event_name, js_err(e));
        }
        handler.forget();
    }
}

fn add_listener<F>(target: &EventTarget, event: &str, handler: F)
where
    F: FnMut(Event) + 'static,
{
    let closure = Closure::<dyn FnMut(Event)>::new(handler);
    let _ = target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
    closure.forget();
}

fn wire_form_events(form: &HtmlFormElement, this: &Weak<RefCell<WebAutosave>>) {
    // (event, textarea accepted, select accepted)
    for (event_name, allow_textarea, allow_select) in [("input", true, false), ("change", false, true)] {
        let this = this.clone();
        add_listener(form, event_name, move |event: Event| {
            let Some(change) = event
                .target()
                .and_then(|t| change_event_of(&t, allow_textarea, allow_select))
            else {
                return;
            };
            with_autosave(&this, |autosave| {
                autosave.value_changed(&change);
            });
        });
    }

    let this = this.clone();
    add_listener(form, "submit", move |_event: Event| {
        with_autosave(&this, |autosave| autosave.stop());
    });
}

/// Handle held by the page; dropping it (`free()`) ends autosave
#[wasm_bindgen]
pub struct AutosaveHandle {
    inner: Rc<RefCell<WebAutosave>>,
}

impl AutosaveHandle {
    /// Page calls may arrive while a callback holds the instance
    fn with_inner<R>(&self, f: impl FnOnce(&mut WebAutosave) -> R) -> Option<R> {
        with_unborrowed(&self.inner, f)
    }
}

#[wasm_bindgen]
impl AutosaveHandle {
    /// Stop autosaving (the form is being submitted)
    pub fn stop(&self) {
        self.with_inner(|autosave| autosave.stop());
    }

    /// Called from the editor library's init hook
    #[wasm_bindgen(js_name = editorReady)]
    pub fn editor_ready(&self) -> bool {
        let Some((ready, library)) = self.with_inner(|autosave| {
            let ready = autosave.editor_library_ready();
            (ready, ready.then(|| autosave.host().editor_library()).flatten())
        }) else {
            return false;
        };
        if let Some(library) = library {
            hook_editor_library(&library, &Rc::downgrade(&self.inner));
        }
        ready
    }

    /// For pages that subscribe editors themselves; true means "subscribe it"
    #[wasm_bindgen(js_name = registerEditor)]
    pub fn register_editor(&self, editor_id: &str) -> bool {
        self.with_inner(|autosave| autosave.register_editor(editor_id))
            .unwrap_or(false)
    }

    /// Called from an editor's change/undo/redo/keydown notifications
    #[wasm_bindgen(js_name = editorChanged)]
    pub fn editor_changed(&self, editor_id: &str, content: &str) -> bool {
        self.with_inner(|autosave| autosave.editor_changed(editor_id, content))
            .unwrap_or(false)
    }

    /// End of the timed attempt (epoch ms); `undefined` disables the cutoff
    #[wasm_bindgen(js_name = setAttemptEndTime)]
    pub fn set_attempt_end_time(&self, end_ms: Option<f64>) {
        self.with_inner(|autosave| autosave.host_mut().set_attempt_end(end_ms));
    }

    /// Current save state, or `undefined` while the instance is busy
    #[wasm_bindgen(js_name = saveState)]
    pub fn save_state(&self) -> Option<String> {
        let autosave = self.inner.try_borrow().ok()?;
        Some(format!("{:?}", autosave.save_state()))
    }
}

fn init_logging() {
    console_error_panic_hook::set_once();
    // Already initialized by an earlier instance
    let _ = console_log::init_with_level(log::Level::Info);
}

/// Start autosave for the attempt form with a delay in seconds.
/// Returns `undefined` when there is no form to watch.
#[wasm_bindgen]
pub fn init(delay_secs: f64) -> Option<AutosaveHandle> {
    init_logging();
    let mut config = AutosaveConfig::default();
    if let Err(e) = config.set_delay_secs(delay_secs) {
        log::warn!("{}; using {} ms", e, config.delay_ms);
    }
    start(config)
}

/// Start autosave from a JSON `AutosaveConfig`
#[wasm_bindgen(js_name = initWithConfig)]
pub fn init_with_config(json: &str) -> Option<AutosaveHandle> {
    init_logging();
    match AutosaveConfig::from_json(json) {
        Ok(config) => start(config),
        Err(e) => {
            log::warn!("{}", e);
            None
        }
    }
}

fn start(config: AutosaveConfig) -> Option<AutosaveHandle> {
    let Some(form) = DomForm::find(&config.form_id) else {
        log::info!("No response form found. Autosave disabled");
        return None;
    };
    let storage = match LocalStorage::open() {
        Ok(storage) => storage,
        Err(e) => {
            log::warn!("Autosave disabled: {}", e);
            return None;
        }
    };
    let element = form.form.clone();
    let poll_ms = config.hidden_poll_interval_ms;
    let detection_interval_ms = config.editor_detection_interval_ms;
    let detection_repeats = config.editor_detection_repeats;

    let inner = Rc::new_cyclic(|this: &Weak<RefCell<WebAutosave>>| {
        let host = BrowserHost::new(this.clone(), &config);
        RefCell::new(Autosave::new(config, form, storage, host))
    });
    let this = Rc::downgrade(&inner);

    wire_form_events(&element, &this);
    inner.borrow_mut().start();
    spawn_hidden_poll(this.clone(), poll_ms);
    spawn_editor_detection(this, detection_interval_ms, detection_repeats);

    Some(AutosaveHandle { inner })
}
