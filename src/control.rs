//! Operator console. Ctrl-C opens a menu instead of killing the process.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::scheduler::JobScheduler;
use crate::types::{ControlMsg, ModelId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    Return,
    SwitchModel,
    Shutdown,
    ListJobs,
}

fn parse_choice(input: &str) -> Option<MenuChoice> {
    match input.trim() {
        "0" => Some(MenuChoice::Return),
        "1" => Some(MenuChoice::SwitchModel),
        "2" => Some(MenuChoice::Shutdown),
        "3" => Some(MenuChoice::ListJobs),
        _ => None,
    }
}

const MENU: &str = "\n0) Return\n1) Switch model\n2) Shut down\n3) List jobs\nChoice: ";

pub struct Console {
    scheduler: Arc<JobScheduler>,
    control_tx: mpsc::Sender<ControlMsg>,
}

impl Console {
    pub fn new(scheduler: Arc<JobScheduler>, control_tx: mpsc::Sender<ControlMsg>) -> Self {
        Self { scheduler, control_tx }
    }

    /// Wait for Ctrl-C, show the menu, forward the operator's choice. Runs until
    /// shutdown is chosen or the control loop goes away.
    pub async fn run(self) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C, console disabled: {e}");
                return;
            }

            let Some(msg) = self.menu(&mut lines).await else {
                info!("Back to running");
                continue;
            };
            let shutting_down = msg == ControlMsg::Shutdown;
            if self.control_tx.send(msg).await.is_err() || shutting_down {
                return;
            }
        }
    }

    /// One menu session. `None` means return to running with nothing to do.
    async fn menu<R>(&self, lines: &mut Lines<R>) -> Option<ControlMsg>
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            print!("{MENU}");
            let input = read_line(lines).await?;
            match parse_choice(&input) {
                Some(MenuChoice::Return) => return None,
                Some(MenuChoice::Shutdown) => return Some(ControlMsg::Shutdown),
                Some(MenuChoice::SwitchModel) => {
                    return prompt_model(lines).await.map(ControlMsg::SwitchModel);
                }
                Some(MenuChoice::ListJobs) => self.print_jobs().await,
                None => println!("Invalid choice: {}", input.trim()),
            }
        }
    }

    async fn print_jobs(&self) {
        let jobs = self.scheduler.jobs().await;
        if jobs.is_empty() {
            println!("No jobs scheduled.");
        }
        for job in jobs {
            let next = job
                .next_fire
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            println!("{}  next: {}  trigger: {}", job.name, next, job.trigger);
        }
    }
}

async fn prompt_model<R>(lines: &mut Lines<R>) -> Option<ModelId>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        print!("Model [{}]: ", ModelId::choices());
        let input = read_line(lines).await?;
        match input.parse() {
            Ok(model) => return Some(model),
            Err(e) => println!("{e}"),
        }
    }
}

/// Next line of input; `None` on EOF or a read error.
async fn read_line<R>(lines: &mut Lines<R>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    use std::io::Write;
    let _ = std::io::stdout().flush();
    match lines.next_line().await {
        Ok(line) => line,
        Err(e) => {
            warn!("Console read failed: {e}");
            None
        }
    }
}
