use crate::engine::Engine;
use crate::error::ScriptError;
use crate::value::{ScriptReturn, ScriptValue};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// 解释器参数。
#[derive(Debug, Clone)]
pub struct ScriptSettings {
    /// 单次编译/调用的最长执行时间
    pub timeout: Duration,
    /// isolate 堆上限（MB）
    pub heap_limit_mb: usize,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            heap_limit_mb: 64,
        }
    }
}

enum Job {
    Compile {
        id: u64,
        name: String,
        source: String,
        reply: oneshot::Sender<Result<(), ScriptError>>,
    },
    HasFunction {
        id: u64,
        func: String,
        reply: oneshot::Sender<Result<bool, ScriptError>>,
    },
    Call {
        id: u64,
        func: String,
        args: Vec<ScriptValue>,
        reply: oneshot::Sender<Result<ScriptReturn, ScriptError>>,
    },
    Release {
        id: u64,
    },
    ProgramCount {
        reply: oneshot::Sender<usize>,
    },
}

/// 共享脚本解释器句柄（可克隆）。
///
/// 后台线程独占 isolate；所有句柄与 [`Program`] 释放后线程退出。
#[derive(Clone)]
pub struct ScriptHost {
    tx: mpsc::Sender<Job>,
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for ScriptHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptHost").finish_non_exhaustive()
    }
}

impl ScriptHost {
    pub fn new(settings: ScriptSettings) -> Result<Self, ScriptError> {
        let (tx, rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), ScriptError>>();

        std::thread::Builder::new()
            .name("gw-script".to_string())
            .spawn(move || {
                let mut engine = match Engine::new(settings.timeout, settings.heap_limit_mb) {
                    Ok(engine) => engine,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                info!(
                    target: "gateway.script",
                    timeout_ms = settings.timeout.as_millis() as u64,
                    heap_limit_mb = settings.heap_limit_mb,
                    "script_host_started"
                );
                while let Ok(job) = rx.recv() {
                    handle_job(&mut engine, job);
                }
                debug!(target: "gateway.script", "script_host_stopped");
            })
            .map_err(|err| ScriptError::Unavailable(format!("spawn script thread: {}", err)))?;

        ready_rx
            .recv()
            .map_err(|err| ScriptError::Unavailable(format!("script thread init: {}", err)))??;

        Ok(Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// 在独立 context 中编译脚本；每次调用都产生新的程序。
    pub async fn compile(&self, name: &str, source: &str) -> Result<Program, ScriptError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();
        submit(
            &self.tx,
            Job::Compile {
                id,
                name: name.to_string(),
                source: source.to_string(),
                reply,
            },
        )?;
        receive(rx).await??;
        debug!(target: "gateway.script", program_id = id, name, "program_compiled");
        Ok(Program {
            inner: Arc::new(ProgramInner {
                id,
                name: name.to_string(),
                tx: self.tx.clone(),
            }),
        })
    }

    /// 当前存活的程序数量。
    pub async fn program_count(&self) -> Result<usize, ScriptError> {
        let (reply, rx) = oneshot::channel();
        submit(&self.tx, Job::ProgramCount { reply })?;
        receive(rx).await
    }
}

struct ProgramInner {
    id: u64,
    name: String,
    tx: mpsc::Sender<Job>,
}

impl Drop for ProgramInner {
    fn drop(&mut self) {
        let _ = self.tx.send(Job::Release { id: self.id });
    }
}

/// 已编译的脚本程序；最后一个句柄释放时回收其 context。
#[derive(Clone)]
pub struct Program {
    inner: Arc<ProgramInner>,
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

impl Program {
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub async fn has_function(&self, func: &str) -> Result<bool, ScriptError> {
        let (reply, rx) = oneshot::channel();
        submit(
            &self.inner.tx,
            Job::HasFunction {
                id: self.inner.id,
                func: func.to_string(),
                reply,
            },
        )?;
        receive(rx).await?
    }

    /// 调用程序中的全局函数。
    pub async fn call(
        &self,
        func: &str,
        args: Vec<ScriptValue>,
    ) -> Result<ScriptReturn, ScriptError> {
        let (reply, rx) = oneshot::channel();
        submit(
            &self.inner.tx,
            Job::Call {
                id: self.inner.id,
                func: func.to_string(),
                args,
                reply,
            },
        )?;
        receive(rx).await?
    }
}

fn submit(tx: &mpsc::Sender<Job>, job: Job) -> Result<(), ScriptError> {
    tx.send(job)
        .map_err(|_| ScriptError::Unavailable("script thread stopped".to_string()))
}

async fn receive<T>(rx: oneshot::Receiver<T>) -> Result<T, ScriptError> {
    rx.await
        .map_err(|_| ScriptError::Unavailable("script thread dropped reply".to_string()))
}

fn handle_job(engine: &mut Engine, job: Job) {
    match job {
        Job::Compile {
            id,
            name,
            source,
            reply,
        } => {
            let result = engine.compile(id, &name, &source);
            if let Err(err) = &result {
                warn!(target: "gateway.script", program_id = id, name = %name, error = %err, "script_compile_failed");
            }
            let _ = reply.send(result);
        }
        Job::HasFunction { id, func, reply } => {
            let _ = reply.send(engine.has_function(id, &func));
        }
        Job::Call {
            id,
            func,
            args,
            reply,
        } => {
            let _ = reply.send(engine.call(id, &func, &args));
        }
        Job::Release { id } => {
            if engine.release(id) {
                debug!(target: "gateway.script", program_id = id, "program_released");
            }
        }
        Job::ProgramCount { reply } => {
            let _ = reply.send(engine.program_count());
        }
    }
}
