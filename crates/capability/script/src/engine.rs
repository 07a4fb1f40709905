//! V8 isolate 封装：只在脚本线程内使用。

use crate::error::ScriptError;
use crate::library::LIBRARY;
use crate::value::{ScriptReturn, ScriptValue};
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Once, OnceLock, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

static INIT: Once = Once::new();
static PLATFORM: OnceLock<v8::SharedRef<v8::Platform>> = OnceLock::new();

/// 返回值转换上限：嵌套深度与元素总数。
const MAX_RETURN_DEPTH: usize = 32;
const MAX_RETURN_NODES: usize = 100_000;

fn init_v8() {
    INIT.call_once(|| {
        let platform = v8::new_default_platform(0, false).make_shared();
        v8::V8::initialize_platform(platform.clone());
        v8::V8::initialize();
        let _ = PLATFORM.set(platform);
    });
}

#[derive(Default)]
struct WatchState {
    /// (代次, 截止时间)
    armed: Option<(u64, Instant)>,
    fired: Option<u64>,
    generation: u64,
    stopped: bool,
}

/// 超时看门狗：常驻线程，到期后终止 isolate 中正在执行的脚本。
struct Watchdog {
    shared: Arc<(Mutex<WatchState>, Condvar)>,
    thread: Option<JoinHandle<()>>,
}

impl Watchdog {
    fn start(handle: v8::IsolateHandle) -> Result<Self, ScriptError> {
        let shared = Arc::new((Mutex::new(WatchState::default()), Condvar::new()));
        let thread = {
            let shared = shared.clone();
            std::thread::Builder::new()
                .name("gw-script-watchdog".to_string())
                .spawn(move || watch(&shared, &handle))
                .map_err(|err| ScriptError::Unavailable(format!("spawn watchdog: {}", err)))?
        };
        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    fn arm(&self, timeout: Duration) -> u64 {
        let (lock, signal) = &*self.shared;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        state.armed = Some((state.generation, Instant::now() + timeout));
        state.fired = None;
        signal.notify_one();
        state.generation
    }

    /// 返回本代次是否已触发；返回后不会再终止执行。
    fn disarm(&self, generation: u64) -> bool {
        let (lock, signal) = &*self.shared;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        state.armed = None;
        let fired = state.fired.take() == Some(generation);
        signal.notify_one();
        fired
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        {
            let (lock, signal) = &*self.shared;
            let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
            state.stopped = true;
            signal.notify_one();
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn watch(shared: &(Mutex<WatchState>, Condvar), handle: &v8::IsolateHandle) {
    let (lock, signal) = shared;
    let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
    while !state.stopped {
        let armed = state.armed;
        state = match armed {
            None => signal.wait(state).unwrap_or_else(PoisonError::into_inner),
            Some((generation, deadline)) => {
                let now = Instant::now();
                if now >= deadline {
                    handle.terminate_execution();
                    state.fired = Some(generation);
                    state.armed = None;
                    state
                } else {
                    signal
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            }
        };
    }
}

/// 堆上限回调的共享数据。
struct HeapGuard {
    handle: v8::IsolateHandle,
    hit: AtomicBool,
}

extern "C" fn near_heap_limit(data: *mut c_void, current_heap_limit: usize, _initial: usize) -> usize {
    // SAFETY: data 指向 Engine 持有的 HeapGuard，Engine 释放前先移除回调
    let guard = unsafe { &*(data as *const HeapGuard) };
    guard.hit.store(true, Ordering::SeqCst);
    guard.handle.terminate_execution();
    // 放宽上限让终止流程有余地完成，调用结束后恢复
    current_heap_limit.saturating_mul(2)
}

pub(crate) struct Engine {
    // 先于 isolate 释放
    programs: HashMap<u64, v8::Global<v8::Context>>,
    watchdog: Watchdog,
    isolate: v8::OwnedIsolate,
    heap: Box<HeapGuard>,
    timeout: Duration,
    heap_limit_mb: usize,
}

impl Engine {
    pub(crate) fn new(timeout: Duration, heap_limit_mb: usize) -> Result<Self, ScriptError> {
        init_v8();
        let heap_limit_mb = heap_limit_mb.max(1);
        let params = v8::CreateParams::default().heap_limits(0, heap_limit_mb * 1024 * 1024);
        let mut isolate = v8::Isolate::new(params);
        let handle = isolate.thread_safe_handle();
        let watchdog = Watchdog::start(handle.clone())?;
        let heap = Box::new(HeapGuard {
            handle,
            hit: AtomicBool::new(false),
        });
        isolate.add_near_heap_limit_callback(near_heap_limit, heap_data(&heap));
        Ok(Self {
            programs: HashMap::new(),
            watchdog,
            isolate,
            heap,
            timeout,
            heap_limit_mb,
        })
    }

    pub(crate) fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// 在新 context 中加载工具库与脚本源码。
    pub(crate) fn compile(&mut self, id: u64, name: &str, source: &str) -> Result<(), ScriptError> {
        self.guarded(|engine| {
            let result = {
                let scope = &mut v8::HandleScope::new(&mut engine.isolate);
                let context = v8::Context::new(scope, Default::default());
                let scope = &mut v8::ContextScope::new(scope, context);
                let tc = &mut v8::TryCatch::new(scope);
                run_source(tc, LIBRARY)
                    .and_then(|_| run_source(tc, source))
                    .map(|_| v8::Global::new(tc, context))
            };
            match result {
                Ok(context) => {
                    engine.programs.insert(id, context);
                    Ok(())
                }
                Err(message) => Err(ScriptError::Compile {
                    name: name.to_string(),
                    message,
                }),
            }
        })
    }

    pub(crate) fn has_function(&mut self, id: u64, func: &str) -> Result<bool, ScriptError> {
        let Engine {
            programs, isolate, ..
        } = self;
        let context = programs.get(&id).ok_or(ScriptError::UnknownProgram(id))?;
        let scope = &mut v8::HandleScope::new(isolate);
        let context = v8::Local::new(scope, context);
        let scope = &mut v8::ContextScope::new(scope, context);
        Ok(lookup_function(scope, context, func).is_some())
    }

    pub(crate) fn call(
        &mut self,
        id: u64,
        func: &str,
        args: &[ScriptValue],
    ) -> Result<ScriptReturn, ScriptError> {
        self.guarded(|engine| {
            let Engine {
                programs, isolate, ..
            } = engine;
            match programs.get(&id) {
                Some(context) => call_in_context(isolate, context, func, args),
                None => Err(ScriptError::UnknownProgram(id)),
            }
        })
    }

    pub(crate) fn release(&mut self, id: u64) -> bool {
        self.programs.remove(&id).is_some()
    }

    /// 在超时与堆上限保护下执行；被终止的执行映射为对应错误。
    fn guarded<T>(
        &mut self,
        run: impl FnOnce(&mut Self) -> Result<T, ScriptError>,
    ) -> Result<T, ScriptError> {
        let generation = self.watchdog.arm(self.timeout);
        let result = run(self);
        let timed_out = self.watchdog.disarm(generation);
        let heap_hit = self.heap.hit.swap(false, Ordering::SeqCst);
        self.isolate.cancel_terminate_execution();

        if heap_hit {
            self.restore_heap_limit();
        }
        match result {
            Err(_) if heap_hit => Err(ScriptError::HeapLimit(self.heap_limit_mb)),
            Err(_) if timed_out => Err(ScriptError::Timeout(self.timeout.as_millis())),
            other => other,
        }
    }

    /// 回收被终止脚本留下的垃圾，并把放宽过的堆上限恢复原值。
    fn restore_heap_limit(&mut self) {
        self.isolate.low_memory_notification();
        self.isolate
            .remove_near_heap_limit_callback(near_heap_limit, self.heap_limit_mb * 1024 * 1024);
        self.isolate
            .add_near_heap_limit_callback(near_heap_limit, heap_data(&self.heap));
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.isolate.remove_near_heap_limit_callback(near_heap_limit, 0);
    }
}

fn heap_data(guard: &HeapGuard) -> *mut c_void {
    guard as *const HeapGuard as *mut c_void
}

fn call_in_context(
    isolate: &mut v8::OwnedIsolate,
    context: &v8::Global<v8::Context>,
    func: &str,
    args: &[ScriptValue],
) -> Result<ScriptReturn, ScriptError> {
    let scope = &mut v8::HandleScope::new(isolate);
    let context = v8::Local::new(scope, context);
    let scope = &mut v8::ContextScope::new(scope, context);
    let tc = &mut v8::TryCatch::new(scope);

    let function = lookup_function(tc, context, func)
        .ok_or_else(|| ScriptError::MissingFunction(func.to_string()))?;

    let mut argv: Vec<v8::Local<v8::Value>> = Vec::with_capacity(args.len());
    for arg in args {
        argv.push(to_v8(tc, arg)?);
    }

    let recv = v8::undefined(tc).into();
    match function.call(tc, recv, &argv) {
        Some(result) => {
            let mut nodes = 0;
            from_v8(tc, result, 0, &mut nodes)
        }
        None => Err(ScriptError::Runtime(exception_text(tc))),
    }
}

fn lookup_function<'s>(
    scope: &mut v8::HandleScope<'s>,
    context: v8::Local<'s, v8::Context>,
    name: &str,
) -> Option<v8::Local<'s, v8::Function>> {
    let global = context.global(scope);
    let key = v8::String::new(scope, name)?;
    let value = global.get(scope, key.into())?;
    v8::Local::<v8::Function>::try_from(value).ok()
}

fn run_source(tc: &mut v8::TryCatch<v8::HandleScope>, source: &str) -> Result<(), String> {
    let code = v8::String::new(tc, source).ok_or_else(|| "source too large".to_string())?;
    let script = match v8::Script::compile(tc, code, None) {
        Some(script) => script,
        None => return Err(exception_text(tc)),
    };
    match script.run(tc) {
        Some(_) => Ok(()),
        None => Err(exception_text(tc)),
    }
}

fn exception_text(tc: &mut v8::TryCatch<v8::HandleScope>) -> String {
    if tc.has_terminated() {
        return "execution terminated".to_string();
    }
    let text = tc
        .exception()
        .and_then(|exception| exception.to_string(tc))
        .map(|text| text.to_rust_string_lossy(tc));
    let line = tc
        .message()
        .and_then(|message| message.get_line_number(tc));
    match (text, line) {
        (Some(text), Some(line)) => format!("{} (line {})", text, line),
        (Some(text), None) => text,
        (None, _) => "unknown exception".to_string(),
    }
}

fn to_v8<'s>(
    scope: &mut v8::HandleScope<'s>,
    value: &ScriptValue,
) -> Result<v8::Local<'s, v8::Value>, ScriptError> {
    let local: v8::Local<v8::Value> = match value {
        ScriptValue::Bytes(bytes) => {
            let len = bytes.len();
            let buffer = if len == 0 {
                v8::ArrayBuffer::new(scope, 0)
            } else {
                let store = v8::ArrayBuffer::new_backing_store_from_vec(bytes.clone()).make_shared();
                v8::ArrayBuffer::with_backing_store(scope, &store)
            };
            v8::Uint8Array::new(scope, buffer, 0, len)
                .ok_or_else(|| ScriptError::Runtime("allocate Uint8Array failed".to_string()))?
                .into()
        }
        ScriptValue::Text(text) => v8::String::new(scope, text)
            .ok_or_else(|| ScriptError::Runtime("allocate string failed".to_string()))?
            .into(),
        ScriptValue::Number(n) => v8::Number::new(scope, *n).into(),
        ScriptValue::Bool(b) => v8::Boolean::new(scope, *b).into(),
    };
    Ok(local)
}

fn from_v8<'s>(
    scope: &mut v8::HandleScope<'s>,
    value: v8::Local<'s, v8::Value>,
    depth: usize,
    nodes: &mut usize,
) -> Result<ScriptReturn, ScriptError> {
    *nodes += 1;
    if depth > MAX_RETURN_DEPTH {
        return Err(ScriptError::Runtime(format!(
            "return value nested deeper than {} levels",
            MAX_RETURN_DEPTH
        )));
    }
    if *nodes > MAX_RETURN_NODES {
        return Err(ScriptError::Runtime(format!(
            "return value has more than {} elements",
            MAX_RETURN_NODES
        )));
    }

    if value.is_null_or_undefined() {
        return Ok(ScriptReturn::Undefined);
    }
    if value.is_boolean() {
        return Ok(ScriptReturn::Bool(value.boolean_value(scope)));
    }
    if value.is_number() {
        return Ok(value
            .number_value(scope)
            .map(ScriptReturn::Number)
            .unwrap_or(ScriptReturn::Undefined));
    }
    if value.is_string() {
        return Ok(ScriptReturn::Text(value.to_rust_string_lossy(scope)));
    }
    if let Ok(view) = v8::Local::<v8::ArrayBufferView>::try_from(value) {
        let mut bytes = vec![0u8; view.byte_length()];
        let copied = view.copy_contents(&mut bytes);
        bytes.truncate(copied);
        return Ok(ScriptReturn::Bytes(bytes));
    }
    if let Ok(buffer) = v8::Local::<v8::ArrayBuffer>::try_from(value) {
        let len = buffer.byte_length();
        return Ok(match v8::Uint8Array::new(scope, buffer, 0, len) {
            Some(view) => {
                let mut bytes = vec![0u8; len];
                let copied = view.copy_contents(&mut bytes);
                bytes.truncate(copied);
                ScriptReturn::Bytes(bytes)
            }
            None => ScriptReturn::Bytes(Vec::new()),
        });
    }
    if let Ok(array) = v8::Local::<v8::Array>::try_from(value) {
        let mut items = Vec::with_capacity((array.length() as usize).min(MAX_RETURN_NODES));
        for index in 0..array.length() {
            let item = match array.get_index(scope, index) {
                Some(item) => from_v8(scope, item, depth + 1, nodes)?,
                None => ScriptReturn::Undefined,
            };
            items.push(item);
        }
        return Ok(ScriptReturn::List(items));
    }
    if value.is_object() {
        // 循环引用时 JSON.stringify 抛异常
        let Some(text) = v8::json::stringify(scope, value) else {
            return Err(ScriptError::Runtime(
                "return value cannot be serialized (cyclic object?)".to_string(),
            ));
        };
        let text = text.to_rust_string_lossy(scope);
        return Ok(match serde_json::from_str(&text) {
            Ok(json) => ScriptReturn::Json(json),
            Err(_) => ScriptReturn::Text(text),
        });
    }
    Ok(ScriptReturn::Text(value.to_rust_string_lossy(scope)))
}
