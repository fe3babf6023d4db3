//! Instrumented in-process fake of the native bridge library.
//!
//! Implements [`JvmAbi`] over a hash-map object space with a small set
//! of canned classes, so the full resolve/marshal/dispatch/translate
//! pipeline can run without a JVM. Every foreign-ish operation is
//! counted, which is what the cache and lifetime tests assert against.

use jbridge::prelude::*;
use jbridge::sys::{RawCallResult, RawValue};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

const INTEGER: &str = "java/lang/Integer";
const STRING: &str = "java/lang/String";
const CLASS: &str = "java/lang/Class";
const STRING_BUILDER: &str = "java/lang/StringBuilder";
const THROWABLE: &str = "java/lang/Throwable";
const FRAME: &str = "java/lang/StackTraceElement";
const WIDGET: &str = "com/example/Widget";

const KNOWN_CLASSES: &[&str] = &[
    INTEGER,
    STRING,
    CLASS,
    STRING_BUILDER,
    THROWABLE,
    FRAME,
    WIDGET,
];

/// (class, name, signature, is_static) rows of the canned method table.
const METHODS: &[(&str, &str, &str, bool)] = &[
    (INTEGER, "intValue", "()I", false),
    (INTEGER, "parseInt", "(Ljava/lang/String;)I", true),
    (STRING_BUILDER, "append", "(Ljava/lang/String;)Ljava/lang/StringBuilder;", false),
    (STRING_BUILDER, "toString", "()Ljava/lang/String;", false),
    (CLASS, "getName", "()Ljava/lang/String;", false),
    (THROWABLE, "getCause", "()Ljava/lang/Throwable;", false),
    (THROWABLE, "getStackTrace", "()[Ljava/lang/StackTraceElement;", false),
    (THROWABLE, "toString", "()Ljava/lang/String;", false),
    (FRAME, "toString", "()Ljava/lang/String;", false),
    (WIDGET, "label", "()Ljava/lang/String;", false),
    (WIDGET, "boom", "()V", false),
    (WIDGET, "reset", "()V", false),
    (WIDGET, "twice", "(I)I", true),
    (WIDGET, "sum", "([I)I", false),
    (WIDGET, "range", "(I)[I", true),
    (WIDGET, "nil", "(Ljava/lang/String;)Z", false),
    (WIDGET, "partner", "()Ljava/lang/Object;", false),
    (WIDGET, "ghost", "()Ljava/lang/Object;", false),
    (WIDGET, "echoBool", "(Z)Z", false),
    (WIDGET, "echoByte", "(B)B", false),
    (WIDGET, "echoChar", "(C)C", false),
    (WIDGET, "echoShort", "(S)S", false),
    (WIDGET, "echoLong", "(J)J", false),
    (WIDGET, "echoFloat", "(F)F", false),
    (WIDGET, "echoDouble", "(D)D", false),
];

/// (class, name, signature, is_static) rows of the canned field table.
const FIELDS: &[(&str, &str, &str, bool)] = &[
    (WIDGET, "count", "I", false),
    (WIDGET, "flag", "Z", true),
];

enum Obj {
    Str(String),
    Array(Vec<RawValue>),
    Integer(i32),
    Builder(String),
    Widget { count: RawValue },
    ClassObject(String),
    Throwable {
        message: String,
        frames: Vec<String>,
        cause: usize,
    },
    Frame(String),
    /// Alias of another handle, as a fresh reference to an existing
    /// object (`StringBuilder.append` returns the receiver this way).
    Ref(usize),
}

struct Member {
    class: String,
    name: String,
}

#[derive(Default)]
struct State {
    next: usize,
    objects: FxHashMap<usize, Obj>,
    classes: FxHashMap<String, usize>,
    class_paths: FxHashMap<usize, String>,
    members: FxHashMap<usize, Member>,
    member_handles: FxHashMap<(String, String, String, bool), usize>,
    static_fields: FxHashMap<(String, String), RawValue>,
    pending: usize,

    class_lookups: FxHashMap<String, usize>,
    member_lookups: FxHashMap<(String, String), usize>,
    pending_clears: usize,
    destroyed: bool,
}

impl State {
    fn alloc(&mut self, obj: Obj) -> usize {
        self.next += 1;
        let id = self.next;
        self.objects.insert(id, obj);
        id
    }

    /// Follow `Ref` aliases down to the real object id.
    fn deref(&self, mut id: usize) -> usize {
        while let Some(Obj::Ref(inner)) = self.objects.get(&id) {
            id = *inner;
        }
        id
    }

    fn throw(&mut self, message: &str) {
        self.pending = self.alloc(Obj::Throwable {
            message: message.to_string(),
            frames: Vec::new(),
            cause: 0,
        });
    }

    fn class_path_of(&self, id: usize) -> &str {
        match self.objects.get(&self.deref(id)) {
            Some(Obj::Str(_)) => STRING,
            Some(Obj::Integer(_)) => INTEGER,
            Some(Obj::Builder(_)) => STRING_BUILDER,
            Some(Obj::Widget { .. }) => WIDGET,
            Some(Obj::ClassObject(_)) => CLASS,
            Some(Obj::Throwable { .. }) => THROWABLE,
            Some(Obj::Frame(_)) => FRAME,
            _ => "",
        }
    }

    fn thrown(&mut self, message: &str, frames: &[&str], cause: usize) -> RawCallResult {
        let thrown = self.alloc(Obj::Throwable {
            message: message.to_string(),
            frames: frames.iter().map(|f| f.to_string()).collect(),
            cause,
        });
        RawCallResult {
            is_void: 0,
            is_exception: 1,
            value: RawValue::object(handle(thrown)),
        }
    }
}

fn handle(id: usize) -> RawHandle {
    RawHandle::from_addr(id)
}

fn value_result(value: RawValue) -> RawCallResult {
    RawCallResult {
        is_void: 0,
        is_exception: 0,
        value,
    }
}

fn void_result() -> RawCallResult {
    RawCallResult {
        is_void: 1,
        is_exception: 0,
        value: RawValue::zero(),
    }
}

#[derive(Default)]
pub struct MockJvm {
    state: Mutex<State>,
}

impl MockJvm {
    pub fn new() -> MockJvm {
        MockJvm::default()
    }

    pub fn class_lookup_count(&self, class_path: &str) -> usize {
        *self
            .state
            .lock()
            .class_lookups
            .get(class_path)
            .unwrap_or(&0)
    }

    pub fn member_lookup_count(&self, class_path: &str, name: &str) -> usize {
        *self
            .state
            .lock()
            .member_lookups
            .get(&(class_path.to_string(), name.to_string()))
            .unwrap_or(&0)
    }

    /// Live string objects in the fake object space; zero when every
    /// transient allocation has been balanced by a release.
    pub fn live_strings(&self) -> usize {
        self.state
            .lock()
            .objects
            .values()
            .filter(|obj| matches!(obj, Obj::Str(_)))
            .count()
    }

    /// Live array objects in the fake object space.
    pub fn live_arrays(&self) -> usize {
        self.state
            .lock()
            .objects
            .values()
            .filter(|obj| matches!(obj, Obj::Array(_)))
            .count()
    }

    pub fn pending_clear_count(&self) -> usize {
        self.state.lock().pending_clears
    }

    pub fn destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Raw stored byte of a static boolean field, for asserting the
    /// canonical 0/1 wire representation.
    pub fn static_bool_byte(&self, class_path: &str, name: &str) -> Option<u8> {
        self.state
            .lock()
            .static_fields
            .get(&(class_path.to_string(), name.to_string()))
            .map(|raw| unsafe { raw.z })
    }
}

impl JvmAbi for MockJvm {
    fn find_class(&self, class_path: &str) -> BridgeResult<RawHandle> {
        let mut state = self.state.lock();
        *state
            .class_lookups
            .entry(class_path.to_string())
            .or_insert(0) += 1;
        if !KNOWN_CLASSES.contains(&class_path) {
            state.throw(&format!("java.lang.NoClassDefFoundError: {class_path}"));
            return Ok(RawHandle::NULL);
        }
        if let Some(id) = state.classes.get(class_path) {
            return Ok(handle(*id));
        }
        state.next += 1;
        let id = state.next;
        state.classes.insert(class_path.to_string(), id);
        state.class_paths.insert(id, class_path.to_string());
        Ok(handle(id))
    }

    fn object_class(&self, object: RawHandle) -> RawHandle {
        let mut state = self.state.lock();
        let path = state.class_path_of(object.addr()).to_string();
        if path.is_empty() {
            return RawHandle::NULL;
        }
        handle(state.alloc(Obj::ClassObject(path)))
    }

    fn method_id(
        &self,
        class: RawHandle,
        name: &str,
        signature: &str,
        is_static: bool,
    ) -> BridgeResult<RawHandle> {
        let mut state = self.state.lock();
        let Some(class_path) = state.class_paths.get(&class.addr()).cloned() else {
            return Ok(RawHandle::NULL);
        };
        *state
            .member_lookups
            .entry((class_path.clone(), name.to_string()))
            .or_insert(0) += 1;

        let known = METHODS.iter().any(|(c, n, s, st)| {
            *c == class_path && *n == name && *s == signature && *st == is_static
        });
        if !known {
            state.throw(&format!("java.lang.NoSuchMethodError: {name}{signature}"));
            return Ok(RawHandle::NULL);
        }

        let key = (class_path.clone(), name.to_string(), signature.to_string(), is_static);
        if let Some(id) = state.member_handles.get(&key) {
            return Ok(handle(*id));
        }
        state.next += 1;
        let id = state.next;
        state.member_handles.insert(key, id);
        state.members.insert(
            id,
            Member {
                class: class_path,
                name: name.to_string(),
            },
        );
        Ok(handle(id))
    }

    fn field_id(
        &self,
        class: RawHandle,
        name: &str,
        signature: &str,
        is_static: bool,
    ) -> BridgeResult<RawHandle> {
        let mut state = self.state.lock();
        let Some(class_path) = state.class_paths.get(&class.addr()).cloned() else {
            return Ok(RawHandle::NULL);
        };
        *state
            .member_lookups
            .entry((class_path.clone(), name.to_string()))
            .or_insert(0) += 1;

        let known = FIELDS.iter().any(|(c, n, s, st)| {
            *c == class_path && *n == name && *s == signature && *st == is_static
        });
        if !known {
            state.throw(&format!("java.lang.NoSuchFieldError: {name}"));
            return Ok(RawHandle::NULL);
        }

        let key = (class_path.clone(), name.to_string(), signature.to_string(), is_static);
        if let Some(id) = state.member_handles.get(&key) {
            return Ok(handle(*id));
        }
        state.next += 1;
        let id = state.next;
        state.member_handles.insert(key, id);
        state.members.insert(
            id,
            Member {
                class: class_path,
                name: name.to_string(),
            },
        );
        Ok(handle(id))
    }

    fn new_object(
        &self,
        class: RawHandle,
        signature: &str,
        args: &[RawValue],
    ) -> BridgeResult<RawHandle> {
        let mut state = self.state.lock();
        let Some(class_path) = state.class_paths.get(&class.addr()).cloned() else {
            return Ok(RawHandle::NULL);
        };
        let obj = match (class_path.as_str(), signature) {
            (INTEGER, "(I)V") => Obj::Integer(unsafe { args[0].i }),
            (INTEGER, "(Ljava/lang/String;)V") => {
                let arg = state.deref(unsafe { args[0].l }.addr());
                let parsed = match state.objects.get(&arg) {
                    Some(Obj::Str(text)) => text.parse().unwrap_or(0),
                    _ => 0,
                };
                Obj::Integer(parsed)
            }
            (STRING_BUILDER, "()V") => Obj::Builder(String::new()),
            (WIDGET, "()V") => Obj::Widget {
                count: RawValue::zero(),
            },
            _ => {
                state.throw(&format!(
                    "java.lang.NoSuchMethodError: {class_path}.<init>{signature}"
                ));
                return Ok(RawHandle::NULL);
            }
        };
        Ok(handle(state.alloc(obj)))
    }

    fn call(
        &self,
        target: RawHandle,
        method: RawHandle,
        _kind: JavaKind,
        args: &[RawValue],
        _is_static: bool,
    ) -> RawCallResult {
        let mut state = self.state.lock();
        let member = state
            .members
            .get(&method.addr())
            .map(|member| (member.class.clone(), member.name.clone()));
        let Some((class, name)) = member else {
            return state.thrown("java.lang.NoSuchMethodError: stale method id", &[], 0);
        };
        let target_id = state.deref(target.addr());

        match (class.as_str(), name.as_str()) {
            (INTEGER, "intValue") => match state.objects.get(&target_id) {
                Some(Obj::Integer(v)) => value_result(RawValue { i: *v }),
                _ => state.thrown("java.lang.NullPointerException", &[], 0),
            },
            (INTEGER, "parseInt") => {
                let arg = state.deref(unsafe { args[0].l }.addr());
                let text = match state.objects.get(&arg) {
                    Some(Obj::Str(text)) => text.clone(),
                    _ => String::new(),
                };
                match text.parse::<i32>() {
                    Ok(v) => value_result(RawValue { i: v }),
                    Err(_) => state.thrown(
                        &format!("java.lang.NumberFormatException: For input string: \"{text}\""),
                        &[],
                        0,
                    ),
                }
            }
            (STRING_BUILDER, "append") => {
                let arg = state.deref(unsafe { args[0].l }.addr());
                let text = match state.objects.get(&arg) {
                    Some(Obj::Str(text)) => text.clone(),
                    _ => String::new(),
                };
                if let Some(Obj::Builder(buffer)) = state.objects.get_mut(&target_id) {
                    buffer.push_str(&text);
                }
                // Returns the receiver through a fresh reference.
                let alias = state.alloc(Obj::Ref(target_id));
                value_result(RawValue::object(handle(alias)))
            }
            (STRING_BUILDER, "toString") => {
                let text = match state.objects.get(&target_id) {
                    Some(Obj::Builder(buffer)) => buffer.clone(),
                    _ => String::new(),
                };
                let id = state.alloc(Obj::Str(text));
                value_result(RawValue::object(handle(id)))
            }
            (CLASS, "getName") => {
                let dotted = match state.objects.get(&target_id) {
                    Some(Obj::ClassObject(path)) => path.replace('/', "."),
                    _ => String::new(),
                };
                let id = state.alloc(Obj::Str(dotted));
                value_result(RawValue::object(handle(id)))
            }
            (THROWABLE, "toString") => {
                let message = match state.objects.get(&target_id) {
                    Some(Obj::Throwable { message, .. }) => message.clone(),
                    _ => String::new(),
                };
                let id = state.alloc(Obj::Str(message));
                value_result(RawValue::object(handle(id)))
            }
            (THROWABLE, "getStackTrace") => {
                let frames = match state.objects.get(&target_id) {
                    Some(Obj::Throwable { frames, .. }) => frames.clone(),
                    _ => Vec::new(),
                };
                let elements: Vec<RawValue> = frames
                    .into_iter()
                    .map(|frame| RawValue::object(handle(state.alloc(Obj::Frame(frame)))))
                    .collect();
                let id = state.alloc(Obj::Array(elements));
                value_result(RawValue::object(handle(id)))
            }
            (THROWABLE, "getCause") => {
                let cause = match state.objects.get(&target_id) {
                    Some(Obj::Throwable { cause, .. }) => *cause,
                    _ => 0,
                };
                value_result(RawValue::object(handle(cause)))
            }
            (FRAME, "toString") => {
                let text = match state.objects.get(&target_id) {
                    Some(Obj::Frame(text)) => text.clone(),
                    _ => String::new(),
                };
                let id = state.alloc(Obj::Str(text));
                value_result(RawValue::object(handle(id)))
            }
            (WIDGET, "label") => {
                let id = state.alloc(Obj::Str("widget".to_string()));
                value_result(RawValue::object(handle(id)))
            }
            (WIDGET, "boom") => {
                let cause = state.alloc(Obj::Throwable {
                    message: "java.lang.NumberFormatException: inner".to_string(),
                    frames: Vec::new(),
                    cause: 0,
                });
                state.thrown(
                    "java.lang.IllegalStateException: boom",
                    &["com.example.Widget.boom(Widget.java:42)"],
                    cause,
                )
            }
            (WIDGET, "reset") => {
                if let Some(Obj::Widget { count }) = state.objects.get_mut(&target_id) {
                    *count = RawValue::zero();
                }
                void_result()
            }
            (WIDGET, "twice") => value_result(RawValue {
                i: unsafe { args[0].i } * 2,
            }),
            (WIDGET, "sum") => {
                let array = state.deref(unsafe { args[0].l }.addr());
                let total = match state.objects.get(&array) {
                    Some(Obj::Array(elements)) => {
                        elements.iter().map(|raw| unsafe { raw.i }).sum()
                    }
                    _ => 0,
                };
                value_result(RawValue { i: total })
            }
            (WIDGET, "range") => {
                let count = unsafe { args[0].i }.max(0);
                let elements: Vec<RawValue> = (0..count).map(|i| RawValue { i }).collect();
                let id = state.alloc(Obj::Array(elements));
                value_result(RawValue::object(handle(id)))
            }
            (WIDGET, "nil") => {
                let is_null = unsafe { args[0].l }.is_null();
                value_result(RawValue {
                    z: u8::from(is_null),
                })
            }
            (WIDGET, "partner") => {
                let id = state.alloc(Obj::Integer(7));
                value_result(RawValue::object(handle(id)))
            }
            // An object whose runtime class cannot be resolved.
            (WIDGET, "ghost") => {
                let id = state.alloc(Obj::Array(Vec::new()));
                value_result(RawValue::object(handle(id)))
            }
            (
                WIDGET,
                "echoBool" | "echoByte" | "echoChar" | "echoShort" | "echoLong" | "echoFloat"
                | "echoDouble",
            ) => value_result(args[0]),
            _ => void_result(),
        }
    }

    fn read_field(
        &self,
        target: RawHandle,
        field: RawHandle,
        _kind: JavaKind,
        is_static: bool,
    ) -> RawValue {
        let state = self.state.lock();
        let Some(member) = state.members.get(&field.addr()) else {
            return RawValue::zero();
        };
        if is_static {
            return state
                .static_fields
                .get(&(member.class.clone(), member.name.clone()))
                .copied()
                .unwrap_or_else(RawValue::zero);
        }
        match state.objects.get(&state.deref(target.addr())) {
            Some(Obj::Widget { count }) if member.name == "count" => *count,
            _ => RawValue::zero(),
        }
    }

    fn write_field(
        &self,
        target: RawHandle,
        field: RawHandle,
        _kind: JavaKind,
        value: RawValue,
        is_static: bool,
    ) {
        let mut state = self.state.lock();
        let Some(member) = state.members.get(&field.addr()) else {
            return;
        };
        let key = (member.class.clone(), member.name.clone());
        if is_static {
            state.static_fields.insert(key, value);
            return;
        }
        let id = state.deref(target.addr());
        if let Some(Obj::Widget { count }) = state.objects.get_mut(&id) {
            if key.1 == "count" {
                *count = value;
            }
        }
    }

    fn new_string(&self, text: &str) -> BridgeResult<RawHandle> {
        let mut state = self.state.lock();
        Ok(handle(state.alloc(Obj::Str(text.to_string()))))
    }

    fn string_contents(&self, string: RawHandle) -> BridgeResult<String> {
        let state = self.state.lock();
        match state.objects.get(&state.deref(string.addr())) {
            Some(Obj::Str(text)) => Ok(text.clone()),
            _ => Ok(String::new()),
        }
    }

    fn new_array(
        &self,
        _kind: JavaKind,
        _element_class: RawHandle,
        elements: &[RawValue],
    ) -> RawHandle {
        let mut state = self.state.lock();
        handle(state.alloc(Obj::Array(elements.to_vec())))
    }

    fn array_length(&self, array: RawHandle) -> i32 {
        let state = self.state.lock();
        match state.objects.get(&state.deref(array.addr())) {
            Some(Obj::Array(elements)) => elements.len() as i32,
            _ => 0,
        }
    }

    fn array_element(&self, array: RawHandle, index: i32, _kind: JavaKind) -> RawValue {
        let state = self.state.lock();
        match state.objects.get(&state.deref(array.addr())) {
            Some(Obj::Array(elements)) => elements
                .get(index as usize)
                .copied()
                .unwrap_or_else(RawValue::zero),
            _ => RawValue::zero(),
        }
    }

    fn pending_exception(&self) -> RawHandle {
        let mut state = self.state.lock();
        state.pending_clears += 1;
        let pending = std::mem::take(&mut state.pending);
        handle(pending)
    }

    fn instance_of(&self, object: RawHandle, class: RawHandle) -> bool {
        let state = self.state.lock();
        let Some(class_path) = state.class_paths.get(&class.addr()) else {
            return false;
        };
        state.class_path_of(object.addr()) == class_path.as_str()
    }

    fn release(&self, handle: RawHandle) {
        self.state.lock().objects.remove(&handle.addr());
    }

    fn destroy(&self) {
        self.state.lock().destroyed = true;
    }
}
