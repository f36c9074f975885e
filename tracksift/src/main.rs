use colored::Colorize;
use tracksift::command_argument_builder;
use tracksift::handlers::{
    handle_dataset, handle_features, handle_init, handle_merge, handle_replay, init_logging,
};
use tracksift_core::print_banner;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        return;
    }

    init_logging(chosen_command.get_count("verbose"));

    let result = match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("replay", primary_command)) => handle_replay(primary_command, quiet).await,
        Some(("features", primary_command)) => handle_features(primary_command, quiet),
        Some(("merge", primary_command)) => handle_merge(primary_command),
        Some(("dataset", primary_command)) => handle_dataset(primary_command),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
