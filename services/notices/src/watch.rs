use crate::infra::{build_engine, NoticeEngine};
use clap::Args;
use site_notices::config::AppConfig;
use site_notices::error::AppError;
use site_notices::notices::NoticeSnapshot;
use site_notices::telemetry;
use std::fmt::Write as _;

#[derive(Args, Debug, Default)]
pub(crate) struct WatchArgs {
    /// Print the first banner and exit
    #[arg(long)]
    pub(crate) once: bool,
}

pub(crate) async fn run_watch(args: WatchArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let NoticeEngine { orchestrator, .. } = build_engine(&config)?;
    let mut updates = orchestrator.subscribe();
    let _polling = orchestrator.activate();

    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        if snapshot.is_loading {
            continue;
        }

        println!("{}", render_banner(&snapshot));
        if args.once {
            break;
        }
    }

    Ok(())
}

pub(crate) fn render_banner(snapshot: &NoticeSnapshot) -> String {
    let banner = snapshot.banner();
    if banner.is_empty() {
        return "No active notices.".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Active notices ({})", snapshot.visible.len());

    if let Some(group) = &banner.disruption {
        let _ = writeln!(
            out,
            "[{}] {}",
            group.severity.as_str().to_ascii_uppercase(),
            group.summary
        );
    }

    for notice in &banner.notices {
        let pin = if notice.dismissible { "" } else { " (pinned)" };
        let _ = write!(
            out,
            "[{}] {}{}",
            notice.severity.as_str().to_ascii_uppercase(),
            notice.title,
            pin
        );
        if let Some(message) = notice.message.as_deref().filter(|text| !text.is_empty()) {
            let _ = write!(out, ": {message}");
        }
        out.push('\n');
    }

    out.trim_end().to_string()
}
