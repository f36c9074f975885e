use colored::Colorize;

pub mod dataset;
pub mod error;
pub mod event;
pub mod features;
pub mod logs;
pub mod merge;
pub mod replay;
pub mod report;
pub mod session;
pub mod store;
pub mod table;

pub use error::{CoreError, Result};
pub use event::{ElementInfo, EventType, InteractionEvent};
pub use features::{
    BehaviorFeatures, FeatureRow, NetworkFeatures, SessionFeatures, aggregate, aggregate_session,
    behavior_table, network_table,
};
pub use merge::{MergeReport, merge, merge_on};
pub use session::{ClosedSession, RequestSource, Session, SessionLog, SessionRecorder};
pub use store::{CaptureStore, SessionStatus};
pub use table::{FeatureTable, TableRow};

pub fn print_banner() {
    let banner = r#"
  _                  _          _  __ _
 | |_ _ __ __ _  ___| | _____(_)/ _| |_
 | __| '__/ _` |/ __| |/ / __| | |_| __|
 | |_| | | (_| | (__|   <\__ \ |  _| |_
  \__|_|  \__,_|\___|_|\_\___/_|_|  \__|
"#;
    println!("{}", banner.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "session features for web-tracking detection".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
