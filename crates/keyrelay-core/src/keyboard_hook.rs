use crate::error::{Error, Result};
use crate::hook::{HookBackend, HookChain, SharedDispatcher};
use crate::types::{HookHandle, HookNotification, RawKeyboardEvent};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, info, trace};
use windows::Win32::Foundation::{HINSTANCE, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT, MSG,
    PEEK_MESSAGE_REMOVE_TYPE, WH_KEYBOARD_LL, WM_QUIT,
};

struct InstalledHook {
    handle: isize,
    dispatcher: SharedDispatcher,
}

lazy_static! {
    /// Low-level hooks carry no user data, so the callback finds its
    /// dispatcher by the thread it runs on (always the installing thread).
    static ref HOOKS: Mutex<HashMap<u32, InstalledHook>> = Mutex::new(HashMap::new());
}

/// `WH_KEYBOARD_LL` hook bound to the thread that installs it.
///
/// The installing thread must pump messages (see [`run_event_loop`]) for the
/// callback to run. One hook per thread.
#[derive(Debug, Default)]
pub struct Win32Hook {
    thread_id: Option<u32>,
}

impl Win32Hook {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HookBackend for Win32Hook {
    fn install(&mut self, dispatcher: SharedDispatcher) -> Result<HookHandle> {
        let thread_id = unsafe { GetCurrentThreadId() };
        let mut hooks = HOOKS.lock();
        if hooks.contains_key(&thread_id) {
            return Err(Error::HookBusy { thread_id });
        }

        // Low-level hooks accept a null module when the procedure lives in
        // this process.
        let hook = unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(hook_proc), HINSTANCE::default(), 0) }
            .map_err(|e| Error::HookInstall {
                op: "SetWindowsHookEx",
                code: e.code().0,
            })?;
        let Some(handle) = HookHandle::new(hook.0) else {
            return Err(Error::HookInstall {
                op: "SetWindowsHookEx",
                code: windows::core::Error::from_win32().code().0,
            });
        };

        hooks.insert(
            thread_id,
            InstalledHook {
                handle: hook.0,
                dispatcher,
            },
        );
        self.thread_id = Some(thread_id);
        info!("Hook registered for thread {}", thread_id);
        Ok(handle)
    }

    fn uninstall(&mut self, handle: HookHandle) -> Result<()> {
        unsafe { UnhookWindowsHookEx(HHOOK(handle.raw())) }.map_err(|e| Error::HookRemove {
            op: "UnhookWindowsHookEx",
            code: e.code().0,
        })?;

        let mut hooks = HOOKS.lock();
        if let Some(thread_id) = self.thread_id.take() {
            if hooks.get(&thread_id).is_some_and(|h| h.handle == handle.raw()) {
                hooks.remove(&thread_id);
            }
        }
        Ok(())
    }
}

/// Forwards to the next hook with the original callback arguments.
struct NextHook {
    wparam: WPARAM,
    lparam: LPARAM,
}

impl HookChain for NextHook {
    fn call_next(&mut self, notification: &HookNotification) -> isize {
        unsafe { CallNextHookEx(None, notification.code, self.wparam, self.lparam) }.0
    }
}

unsafe extern "system" fn hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code < 0 {
        return CallNextHookEx(None, code, wparam, lparam);
    }

    let kbd = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
    let notification = HookNotification {
        code,
        message: wparam.0 as u32,
        raw: RawKeyboardEvent {
            vk_code: kbd.vkCode,
            scan_code: kbd.scanCode,
            flags: kbd.flags.0,
            time: kbd.time,
            extra_info: kbd.dwExtraInfo,
        },
    };

    let dispatcher = HOOKS
        .lock()
        .get(&GetCurrentThreadId())
        .map(|h| Arc::clone(&h.dispatcher));
    let mut chain = NextHook { wparam, lparam };
    let Some(dispatcher) = dispatcher else {
        return LRESULT(chain.call_next(&notification));
    };

    // A subscriber that generates input can re-enter the hook on this
    // thread; the nested call sees a locked dispatcher and just forwards.
    let outcome = catch_unwind(AssertUnwindSafe(|| match dispatcher.try_lock() {
        Some(mut dispatcher) => dispatcher.hook_proc(&notification, &mut chain),
        None => {
            trace!("Re-entrant hook call for vk {:#04x}, forwarding", notification.raw.vk_code);
            chain.call_next(&notification)
        }
    }));

    match outcome {
        Ok(result) => LRESULT(result),
        Err(_) => {
            error!("Keyboard hook callback panicked; forwarding the event");
            LRESULT(chain.call_next(&notification))
        }
    }
}

/// Runs a blocking message loop on the calling thread until `WM_QUIT`.
pub fn run_event_loop() {
    info!("Starting message loop...");
    let mut msg = MSG::default();
    unsafe {
        // Force message queue creation
        let _ = PeekMessageW(&mut msg, None, 0, 0, PEEK_MESSAGE_REMOVE_TYPE(0));

        while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
    info!("Message loop exited.");
}

/// Asks the message loop running on `thread_id` to exit.
pub fn quit_event_loop(thread_id: u32) {
    if let Err(e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
        error!("Failed to post WM_QUIT to thread {}: {}", thread_id, e);
    }
}

/// Id of the calling thread, for [`quit_event_loop`].
pub fn current_thread_id() -> u32 {
    unsafe { GetCurrentThreadId() }
}
