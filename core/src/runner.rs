// Process runner - 外部工具进程执行
// argv 方式启动，绝不经过 shell；stdout/stderr 按行捕获

use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// 完整解析好的外部命令：可执行文件路径加离散参数
/// 参数绝不拼进 shell 字符串，用户查询无法注入
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// 用于日志的展示形式
    pub fn display(&self) -> String {
        format!("{} {}", self.program.display(), self.args.join(" "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// 一次运行的终止通知 - 启动失败与正常退出同样是终态，之后不再有输出
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitSummary {
    Exited {
        code: Option<i32>,
        signal: Option<i32>,
    },
    SpawnFailed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Line(OutputStream, String),
    /// 恰好发送一次，始终最后
    Exit(ExitSummary),
}

/// 启动 cmd 并流式转发输出：行按到达顺序投递（两路交织为尽力而为），
/// 随后恰好一个 RunEvent::Exit。启动失败走通道上报而非返回值，
/// 调用方两种结局只需一条控制路径
pub fn run_streamed(cmd: ToolCommand) -> mpsc::UnboundedReceiver<RunEvent> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &cmd.cwd {
            command.current_dir(dir);
        }

        tracing::info!(command = %cmd.display(), cwd = ?cmd.cwd, "spawn");

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(command = %cmd.display(), "spawn failed: {e}");
                let _ = tx.send(RunEvent::Exit(ExitSummary::SpawnFailed {
                    error: e.to_string(),
                }));
                return;
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_task = forward_lines(stdout, OutputStream::Stdout, tx.clone());
        let err_task = forward_lines(stderr, OutputStream::Stderr, tx.clone());

        let status = child.wait().await;
        // 等两个读取任务结束，保证 Exit 始终在所有输出之后
        let _ = out_task.await;
        let _ = err_task.await;

        let summary = match status {
            Ok(status) => ExitSummary::Exited {
                code: status.code(),
                signal: exit_signal(&status),
            },
            Err(e) => ExitSummary::SpawnFailed {
                error: e.to_string(),
            },
        };
        let _ = tx.send(RunEvent::Exit(summary));
    });

    rx
}

fn forward_lines<R>(
    reader: Option<R>,
    stream: OutputStream,
    tx: mpsc::UnboundedSender<RunEvent>,
) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(reader) = reader else { return };
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(RunEvent::Line(stream, line)).is_err() {
                break;
            }
        }
    })
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(mut rx: mpsc::UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn captures_stdout_lines_then_exit() {
        let cmd = ToolCommand::new("/bin/echo").arg("hello").arg("world");
        let events = collect(run_streamed(cmd)).await;

        assert_eq!(
            events[0],
            RunEvent::Line(OutputStream::Stdout, "hello world".into())
        );
        assert_eq!(
            events.last(),
            Some(&RunEvent::Exit(ExitSummary::Exited {
                code: Some(0),
                signal: None
            }))
        );
    }

    #[tokio::test]
    async fn spawn_failure_is_reported_through_the_channel() {
        let cmd = ToolCommand::new("/nonexistent/definitely-not-a-binary");
        let events = collect(run_streamed(cmd)).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            RunEvent::Exit(ExitSummary::SpawnFailed { .. })
        ));
    }

    #[tokio::test]
    async fn nonzero_exit_code_is_surfaced() {
        let cmd = ToolCommand::new("/bin/sh").arg("-c").arg("exit 3");
        let events = collect(run_streamed(cmd)).await;

        assert_eq!(
            events.last(),
            Some(&RunEvent::Exit(ExitSummary::Exited {
                code: Some(3),
                signal: None
            }))
        );
    }

    #[tokio::test]
    async fn respects_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = ToolCommand::new("/bin/sh")
            .arg("-c")
            .arg("pwd")
            .cwd(dir.path());
        let events = collect(run_streamed(cmd)).await;

        let RunEvent::Line(_, line) = &events[0] else {
            panic!("expected output line");
        };
        let reported = std::fs::canonicalize(line).unwrap();
        let expected = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(reported, expected);
    }
}
