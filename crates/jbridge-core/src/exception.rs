//! Foreign exception translation.
//!
//! Walks a thrown object's cause chain and stack frames through a small
//! set of reflective member handles resolved once per context, renders a
//! multi-line diagnostic, and raises it as [`BridgeError::Foreign`].
//! Translation never raises a new foreign error itself: when
//! introspection fails it degrades to the best text available.

use jbridge_sys::{JavaKind, RawHandle};

use crate::error::{BridgeError, BridgeResult};
use crate::jvm::Jvm;

const FALLBACK_TEXT: &str = "java exception (details unavailable)";

/// Reflective member handles for walking `Throwable`s, resolved lazily
/// and cached for the context lifetime.
pub(crate) struct ThrowableSupport {
    get_cause: RawHandle,
    get_stack: RawHandle,
    to_string: RawHandle,
    frame_to_string: RawHandle,
}

impl Jvm {
    fn throwable_support(&self) -> Option<&ThrowableSupport> {
        self.inner
            .throwable
            .get_or_try_init(|| -> BridgeResult<ThrowableSupport> {
                let throwable = self.resolve_class("java/lang/Throwable")?;
                let frame = self.resolve_class("java/lang/StackTraceElement")?;
                let abi = self.abi();
                Ok(ThrowableSupport {
                    get_cause: throwable.resolve_method(
                        abi,
                        "getCause",
                        "()Ljava/lang/Throwable;",
                        false,
                    )?,
                    get_stack: throwable.resolve_method(
                        abi,
                        "getStackTrace",
                        "()[Ljava/lang/StackTraceElement;",
                        false,
                    )?,
                    to_string: throwable.resolve_method(
                        abi,
                        "toString",
                        "()Ljava/lang/String;",
                        false,
                    )?,
                    frame_to_string: frame.resolve_method(
                        abi,
                        "toString",
                        "()Ljava/lang/String;",
                        false,
                    )?,
                })
            })
            .ok()
    }

    /// Turn a thrown foreign object into a host error, releasing the
    /// thrown handle and every intermediate handle produced while
    /// walking it.
    pub(crate) fn translate_exception(&self, thrown: RawHandle) -> BridgeError {
        let text = self
            .render_throwable(thrown, true)
            .unwrap_or_else(|| FALLBACK_TEXT.to_string());

        self.registry().forget(thrown);
        self.abi().release(thrown);

        match text.find('\n') {
            Some(split) => BridgeError::Foreign {
                message: text[..split].to_string(),
                stack_trace: text[split + 1..].to_string(),
            },
            None => BridgeError::Foreign {
                message: text,
                stack_trace: String::new(),
            },
        }
    }

    /// Render `toString`, the stack frames, and the cause chain of one
    /// throwable. Does not release `thrown` itself; does release every
    /// handle it creates along the way.
    fn render_throwable(&self, thrown: RawHandle, is_top: bool) -> Option<String> {
        let support = self.throwable_support()?;
        let mut text = String::new();
        if !is_top {
            text.push_str("Caused by: ");
        }

        match self.call_for_object(thrown, support.to_string) {
            Some(message) => match self.take_string(message) {
                Some(message) => text.push_str(&message),
                None => text.push_str(FALLBACK_TEXT),
            },
            None => text.push_str(FALLBACK_TEXT),
        }

        if let Some(frames) = self.call_for_object(thrown, support.get_stack) {
            let count = self.abi().array_length(frames);
            for index in 0..count {
                let element = self.abi().array_element(frames, index, JavaKind::Object);
                let frame = unsafe { element.l };
                if frame.is_null() {
                    continue;
                }
                if let Some(line) = self
                    .call_for_object(frame, support.frame_to_string)
                    .and_then(|s| self.take_string(s))
                {
                    text.push_str("\n    ");
                    text.push_str(&line);
                }
                self.abi().release(frame);
            }
            self.abi().release(frames);
        }

        if let Some(cause) = self.call_for_object(thrown, support.get_cause) {
            if let Some(rendered) = self.render_throwable(cause, false) {
                text.push('\n');
                text.push_str(&rendered);
            }
            self.abi().release(cause);
        }

        Some(text)
    }

    /// Zero-argument object-returning call that can never surface a new
    /// foreign exception: a nested throw is released and treated as "no
    /// result".
    fn call_for_object(&self, target: RawHandle, method: RawHandle) -> Option<RawHandle> {
        let resp = self
            .abi()
            .call(target, method, JavaKind::Object, &[], false);
        let handle = unsafe { resp.value.l };
        if resp.is_exception() {
            self.abi().release(handle);
            return None;
        }
        if handle.is_null() { None } else { Some(handle) }
    }

    /// Extract and release a foreign string handle.
    fn take_string(&self, string: RawHandle) -> Option<String> {
        let text = self.abi().string_contents(string).ok();
        self.abi().release(string);
        text
    }
}
