//! geoplan 命令行
//!
//! 用法：geoplan [--interactive] [--config PATH] <task…>
//! 交互模式下每个计划都在 stdin 上审阅（回车或 y 批准，其它输入作为修改意见）。
//! 过程事件以 JSON 行写到 stderr，最终结果以 JSON 写到 stdout；Ctrl+C 协作式取消。

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::{mpsc, Mutex};

use geoplan::config::load_config;
use geoplan::core::{
    AutoApprove, ExecutionMode, OrchestratorBuilder, OrchestratorError, PlanReviewer,
    ReviewDecision, TaskSupervisor,
};
use geoplan::plan::{Plan, Task};

#[derive(Parser, Debug)]
#[command(
    name = "geoplan",
    version,
    about = "Plan, review and execute geospatial analysis tasks"
)]
struct CliArgs {
    /// 每个计划先在终端上审阅
    #[arg(short, long)]
    interactive: bool,

    /// 额外的配置文件（覆盖 config/default.toml）
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 任务描述
    #[arg(required = true, trailing_var_arg = true, num_args = 1..)]
    task: Vec<String>,
}

impl CliArgs {
    fn task_text(&self) -> String {
        self.task.join(" ")
    }
}

/// 在终端上审阅计划
struct StdinReviewer {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdinReviewer {
    fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

#[async_trait]
impl PlanReviewer for StdinReviewer {
    async fn review(&self, _task: &Task, plan: &Plan, revision: u32) -> ReviewDecision {
        let mut stderr = tokio::io::stderr();
        let prompt = format!(
            "\n=== Plan revision {} ===\n{}\nApprove? [Enter/y = approve, otherwise type a comment]: ",
            revision,
            plan.to_pretty_json()
        );
        let _ = stderr.write_all(prompt.as_bytes()).await;
        let _ = stderr.flush().await;

        let line = match self.lines.lock().await.next_line().await {
            Ok(Some(line)) => line,
            // stdin 关闭时视为批准
            _ => return ReviewDecision::Approve,
        };
        let answer = line.trim();
        if answer.is_empty() || answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
            ReviewDecision::Approve
        } else {
            ReviewDecision::Comment(answer.to_string())
        }
    }
}

fn error_report(err: &OrchestratorError) -> serde_json::Value {
    let history = match err {
        OrchestratorError::RetryBudgetExhausted { history, .. }
        | OrchestratorError::Cancelled { history } => serde_json::to_value(history).unwrap_or_default(),
        _ => serde_json::Value::Null,
    };
    serde_json::json!({
        "status": "failed",
        "error": err.to_string(),
        "history": history,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    geoplan::observability::init();

    let args = CliArgs::parse();
    let cfg = load_config(args.config.clone()).context("Failed to load config")?;
    let mode = if args.interactive || cfg.orchestrator.interactive {
        ExecutionMode::Interactive
    } else {
        ExecutionMode::Autonomous
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let orchestrator = OrchestratorBuilder::new(cfg).with_events(tx).build().await;
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Ok(line) = serde_json::to_string(&event) {
                eprintln!("{}", line);
            }
        }
    });

    let supervisor = TaskSupervisor::new();
    let task = Task::new(args.task_text());
    let task_id = task.id().to_string();
    let cancel = supervisor.begin(&task_id).await;
    {
        let supervisor = supervisor.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received, cancelling");
                supervisor.cancel_all();
            }
        });
    }

    let result = match mode {
        ExecutionMode::Interactive => {
            orchestrator
                .run(task, mode, &StdinReviewer::new(), &cancel)
                .await
        }
        ExecutionMode::Autonomous => orchestrator.run(task, mode, &AutoApprove, &cancel).await,
    };
    supervisor.finish(&task_id).await;
    drop(orchestrator);
    let _ = printer.await;

    match result {
        Ok(outcome) => {
            let mut report = serde_json::to_value(&outcome).context("Failed to serialize outcome")?;
            report["status"] = serde_json::json!("succeeded");
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&error_report(&err))?);
            std::process::exit(1);
        }
    }
}
