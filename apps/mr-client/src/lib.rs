pub mod console;

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre;
use serde::Serialize;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use mr_cli::ConfigArgs;
use mr_config::{Config, LoadBy};
use mr_domain::{
	BoundingBox, ChallengeId, Direction, NextTaskStrategy, ReviewTasksType, ReviewVerdict,
	SearchCriteria, TaskId, compile_criteria,
};
use mr_service::{
	Collaborators, FetchOutcome, MapSession, RemoteServer, SearchTarget, SequenceOutcome,
};

use crate::console::{LogNavigator, LogReporter, LogStore};

#[derive(Debug, Parser)]
#[command(
	version = mr_cli::VERSION,
	rename_all = "kebab",
	styles = mr_cli::styles(),
)]
pub struct Args {
	#[command(flatten)]
	pub config: ConfigArgs,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
#[command(rename_all = "kebab")]
pub enum Command {
	/// Print the wire parameters a search would send.
	Compile {
		#[command(flatten)]
		criteria: CriteriaArgs,
		#[arg(long, value_name = "ID", value_delimiter = ',')]
		exclude: Vec<TaskId>,
	},
	/// Run one search and print the resulting group.
	Search {
		#[arg(long, value_enum, default_value_t = Target::Challenges)]
		target: Target,
		#[arg(long, value_name = "ID")]
		challenge_id: Option<ChallengeId>,
		/// Tasks currently in view; with `--target map` it decides between tasks and clusters.
		#[arg(long, value_name = "N", default_value_t = 0)]
		task_count: u64,
		#[command(flatten)]
		criteria: CriteriaArgs,
	},
	Lock {
		task_id: TaskId,
	},
	Unlock {
		task_id: TaskId,
	},
	/// Lock the tasks and group them into a new bundle.
	Bundle {
		#[arg(long, default_value = "bundle")]
		name: String,
		#[arg(required = true, num_args = 2..)]
		task_ids: Vec<TaskId>,
	},
	/// Claim a task for review, submit the verdict and claim the next one.
	ReviewNext {
		task_id: TaskId,
		#[arg(long, value_enum)]
		verdict: Verdict,
		#[arg(long)]
		comment: Option<String>,
		#[arg(long)]
		meta: bool,
		/// The task to move to, for the `nearby` and `inbox` strategies.
		#[arg(long, value_name = "ID")]
		next: Option<TaskId>,
		#[command(flatten)]
		criteria: CriteriaArgs,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
	Challenges,
	Clusters,
	Tasks,
	Map,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Verdict {
	Approved,
	Rejected,
	ApprovedWithFixes,
	Disputed,
}
impl From<Verdict> for ReviewVerdict {
	fn from(verdict: Verdict) -> Self {
		match verdict {
			Verdict::Approved => Self::Approved,
			Verdict::Rejected => Self::Rejected,
			Verdict::ApprovedWithFixes => Self::ApprovedWithFixes,
			Verdict::Disputed => Self::Disputed,
		}
	}
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct CriteriaArgs {
	/// Free text; `#word` tokens become keywords.
	#[arg(long, short = 'q')]
	pub query: Option<String>,
	/// A filter as KEY=VALUE. VALUE is read as JSON when it parses, otherwise as a string.
	#[arg(long = "filter", short = 'f', value_name = "KEY=VALUE", value_parser = parse_filter)]
	pub filters: Vec<(String, Value)>,
	#[arg(long = "invert", value_name = "FILTER")]
	pub inverted: Vec<String>,
	#[arg(long, value_name = "W,S,E,N")]
	pub bounds: Option<BoundingBox>,
	#[arg(long, value_name = "FIELD")]
	pub sort_by: Option<String>,
	#[arg(long)]
	pub desc: bool,
	#[arg(long, default_value_t = 0)]
	pub page: u32,
	#[arg(long, value_name = "N")]
	pub limit: Option<u32>,
	#[arg(long)]
	pub saved_only: bool,
	#[arg(long)]
	pub exclude_other_reviewers: bool,
}
impl CriteriaArgs {
	pub fn to_criteria(&self, default_page_size: u32) -> SearchCriteria {
		let mut criteria = SearchCriteria::new();

		for (key, value) in &self.filters {
			criteria = criteria.with_filter(key.clone(), value.clone());
		}
		for field in &self.inverted {
			criteria = criteria.with_inverted(field.clone(), true);
		}
		if let Some(sort_by) = &self.sort_by {
			let direction = if self.desc { Direction::Desc } else { Direction::Asc };

			criteria = criteria.with_sort(sort_by.clone(), direction);
		}

		criteria
			.with_query(self.query.clone())
			.with_map_bounds(self.bounds)
			.with_saved_challenges_only(self.saved_only)
			.with_exclude_other_reviewers(self.exclude_other_reviewers)
			.with_page_size(self.limit.unwrap_or(default_page_size))
			.with_page(self.page)
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = args.config.load()?;

	init_tracing(&config)?;

	let page_size = config.search.default_page_size;

	if let Command::Compile { criteria, exclude } = &args.command {
		return print(&compile_criteria(&criteria.to_criteria(page_size), exclude));
	}

	let server = RemoteServer::from_config(&config.server)?;
	let collab = Collaborators::new(
		Arc::new(server),
		Arc::new(LogStore),
		Arc::new(LogReporter),
		Arc::new(LogNavigator),
	);
	let session = MapSession::new(&config, collab);

	match args.command {
		Command::Compile { .. } => Ok(()),
		Command::Search { target, challenge_id, task_count, criteria } => {
			let criteria = criteria.to_criteria(page_size);
			let target = match target {
				Target::Challenges => SearchTarget::Challenges,
				Target::Clusters => SearchTarget::TaskClusters { challenge_id },
				Target::Tasks => SearchTarget::BoundedTasks,
				Target::Map => session.search.map_target(challenge_id, &criteria, task_count),
			};

			match session.search.fetch(target, &criteria).await? {
				FetchOutcome::Failed { error, .. } => Err(error.into()),
				_ => print(&session.search.results(target)),
			}
		},
		Command::Lock { task_id } => print(&session.locks.lock(task_id).await?),
		Command::Unlock { task_id } => {
			session.locks.unlock_and_wait(task_id).await;

			tracing::info!(task_id, "Lock released.");

			Ok(())
		},
		Command::Bundle { name, task_ids } => {
			let bundle = session.locks.create_bundle(&name, &task_ids).await?;

			print(&bundle)
		},
		Command::ReviewNext { task_id, verdict, comment, meta, next, criteria } => {
			let kind =
				if meta { ReviewTasksType::MetaReview } else { ReviewTasksType::NeedsReview };
			let strategy = strategy(config.review.load_by, next)?;

			session.review.set_criteria(kind, criteria.to_criteria(config.review.page_size));
			session.review.claim(task_id, meta).await?;

			let outcome = session
				.review
				.submit(verdict.into(), comment.as_deref(), kind, strategy)
				.await?;

			match outcome {
				SequenceOutcome::Advanced(task) => print(&task),
				SequenceOutcome::Exhausted => print(&json!({ "exhausted": true })),
				SequenceOutcome::Cancelled => print(&json!({ "cancelled": true })),
				SequenceOutcome::FellBack { error } => {
					tracing::warn!(error = %error, "Review submitted; no next task claimed.");

					print(&json!({ "exhausted": false, "error": error.to_string() }))
				},
			}
		},
	}
}

/// Maps the configured `review.load_by` to a strategy. `next` is the task the user picked.
pub fn strategy(load_by: LoadBy, next: Option<TaskId>) -> color_eyre::Result<NextTaskStrategy> {
	match load_by {
		LoadBy::Next => Ok(NextTaskStrategy::NextInSortOrder),
		LoadBy::Nearby => Ok(NextTaskStrategy::Nearby { chosen: next }),
		LoadBy::Inbox => next
			.map(|task_id| NextTaskStrategy::Inbox { task_id })
			.ok_or_else(|| eyre::eyre!("review.load_by = \"inbox\" requires --next.")),
	}
}

fn parse_filter(raw: &str) -> Result<(String, Value), String> {
	let Some((key, value)) = raw.split_once('=') else {
		return Err(format!("expected KEY=VALUE, got {raw:?}."));
	};
	let key = key.trim();

	if key.is_empty() {
		return Err("filter key must be non-empty.".to_string());
	}

	let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

	Ok((key.to_string(), value))
}

fn print(value: &impl Serialize) -> color_eyre::Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);

	Ok(())
}

fn init_tracing(config: &Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	Ok(())
}
