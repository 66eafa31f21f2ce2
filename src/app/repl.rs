use crate::app::orchestrator::Orchestrator;
use crate::config::toml_config::ReplConfig;
use crate::utils::error::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplStats {
    pub runs: usize,
    pub failures: usize,
}

/// Interactive loop: one instruction per line until an exit token or EOF.
pub struct Repl {
    orchestrator: Orchestrator,
    config: ReplConfig,
}

impl Repl {
    pub fn new(orchestrator: Orchestrator, config: ReplConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    pub async fn run<R, W>(&self, mut input: R, output: &mut W) -> Result<ReplStats>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut stats = ReplStats::default();
        let mut buf = Vec::new();

        output
            .write_all(
                format!(
                    "🤖 SUMO orchestrator REPL ({} planner). Type '{}' to leave.\n\n",
                    self.orchestrator.planner_name(),
                    self.config.exit_tokens.join("' or '")
                )
                .as_bytes(),
            )
            .await?;

        loop {
            output.write_all(self.config.prompt.as_bytes()).await?;
            output.flush().await?;

            buf.clear();
            if input.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            // 無法解碼的一行只回報錯誤，不結束互動流程
            let Ok(line) = std::str::from_utf8(&buf) else {
                stats.runs += 1;
                stats.failures += 1;
                output
                    .write_all(
                        "🚨 Input is not valid UTF-8, line skipped.\n💡 Switch the terminal to UTF-8 and type the instruction again\n\n"
                            .as_bytes(),
                    )
                    .await?;
                continue;
            };
            let instruction = line.trim();
            if instruction.is_empty() {
                continue;
            }
            if self.config.is_exit_token(instruction) {
                output.write_all("👋 Leaving the REPL...\n".as_bytes()).await?;
                break;
            }

            stats.runs += 1;
            // 單次失敗不能結束整個互動流程
            let report = match self.orchestrator.handle(instruction).await {
                Ok(summary) => format!("\n===== RESULT =====\n\n{}\n\n==================\n\n", summary),
                Err(e) => {
                    stats.failures += 1;
                    format!(
                        "🚨 Error during execution:\n{}\n💡 {}\n\n==================\n\n",
                        e.user_friendly_message(),
                        e.recovery_suggestion()
                    )
                }
            };
            output.write_all(report.as_bytes()).await?;
        }

        output.flush().await?;
        Ok(stats)
    }
}
