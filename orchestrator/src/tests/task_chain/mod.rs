use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use rstest::*;

use crate::error::{ChainBuildError, TaskError};
use crate::tests::common::{account, test_jobs, TestJobs};
use crate::types::jobs::{JobId, JobStatus};
use crate::types::AccountId;
use crate::worker::task_chain::{
    ChainRun, ChainRunner, OverrideKey, Overrides, StepOutcome, StepPolicy, StepSpec, TaskChain, TaskChainBuilder,
    TaskStep, CHAIN_RUN_KEY,
};

const RUN_NUMBER: OverrideKey<u32> = OverrideKey::new("run_number");

/// Step failing its first `failures` runs. Writes its run number before deciding.
#[derive(Clone)]
struct ScriptedStep {
    runs: Arc<AtomicU32>,
    failures: u32,
    retryable: bool,
    writes: bool,
}

impl ScriptedStep {
    fn ok() -> Self {
        Self { runs: Arc::new(AtomicU32::new(0)), failures: 0, retryable: true, writes: false }
    }

    fn failing(failures: u32, retryable: bool) -> Self {
        Self { failures, retryable, ..Self::ok() }
    }

    fn writing(mut self) -> Self {
        self.writes = true;
        self
    }

    fn runs(&self) -> u32 {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskStep<()> for ScriptedStep {
    async fn run(&self, _args: &(), overrides: &mut Overrides) -> Result<(), TaskError> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        if self.writes {
            overrides.set(&RUN_NUMBER, &run)?;
        }
        if run <= self.failures {
            return Err(if self.retryable {
                TaskError::retryable(format!("not yet, run {run}"))
            } else {
                TaskError::failed(format!("broken, run {run}"))
            });
        }
        Ok(())
    }
}

fn three_steps(first: ScriptedStep, second: ScriptedStep, third: ScriptedStep) -> TaskChain<()> {
    TaskChainBuilder::new("test chain")
        .step(StepSpec::new("first", first).writes(&[RUN_NUMBER.name()]).next("second"))
        .step(StepSpec::new("second", second).reads(&[RUN_NUMBER.name()]).next("third"))
        .step(StepSpec::new("third", third))
        .build()
        .unwrap()
}

fn runner(chain: TaskChain<()>, jobs: &TestJobs, policy: StepPolicy) -> ChainRunner<()> {
    ChainRunner::new(Arc::new(chain), jobs.manager(), policy)
}

fn policy(max_attempts: Option<u32>, fail_fast: bool) -> StepPolicy {
    StepPolicy { max_attempts, retry_interval: Duration::ZERO, fail_fast }
}

#[test]
fn builder_orders_steps_from_the_initial_one() {
    let chain = TaskChainBuilder::<()>::new("ordered")
        .step(StepSpec::new("c", ScriptedStep::ok()))
        .step(StepSpec::new("a", ScriptedStep::ok()).next("b"))
        .step(StepSpec::new("b", ScriptedStep::ok()).next("c"))
        .build()
        .unwrap();

    assert_eq!(chain.initial(), "a");
    assert_eq!(chain.order(), &["a", "b", "c"]);
    assert_eq!(chain.next("b"), Some("c"));
    assert_eq!(chain.next("c"), None);
}

#[test]
fn builder_rejects_empty_chain() {
    let result = TaskChainBuilder::<()>::new("empty").build();
    assert_matches!(result, Err(ChainBuildError::Empty { .. }));
}

#[test]
fn builder_rejects_duplicate_steps() {
    let result = TaskChainBuilder::<()>::new("dup")
        .step(StepSpec::new("a", ScriptedStep::ok()))
        .step(StepSpec::new("a", ScriptedStep::ok()))
        .build();
    assert_matches!(result, Err(ChainBuildError::DuplicateStep { step }) if step == "a");
}

#[test]
fn builder_rejects_unknown_next() {
    let result =
        TaskChainBuilder::<()>::new("dangling").step(StepSpec::new("a", ScriptedStep::ok()).next("missing")).build();
    assert_matches!(result, Err(ChainBuildError::UnknownNext { step, next }) if step == "a" && next == "missing");
}

#[test]
fn builder_rejects_two_initial_steps() {
    let result = TaskChainBuilder::<()>::new("forked")
        .step(StepSpec::new("a", ScriptedStep::ok()).next("c"))
        .step(StepSpec::new("b", ScriptedStep::ok()).next("c"))
        .step(StepSpec::new("c", ScriptedStep::ok()))
        .build();
    assert_matches!(result, Err(ChainBuildError::InitialStep { found, .. }) if found == vec!["a", "b"]);
}

#[test]
fn builder_rejects_cycles() {
    let result = TaskChainBuilder::<()>::new("looping")
        .step(StepSpec::new("a", ScriptedStep::ok()).next("b"))
        .step(StepSpec::new("b", ScriptedStep::ok()).next("c"))
        .step(StepSpec::new("c", ScriptedStep::ok()).next("b"))
        .build();
    assert_matches!(result, Err(ChainBuildError::Cycle { step }) if step == "b");
}

#[test]
fn builder_rejects_unreachable_steps() {
    let result = TaskChainBuilder::<()>::new("island")
        .step(StepSpec::new("a", ScriptedStep::ok()).next("b"))
        .step(StepSpec::new("b", ScriptedStep::ok()))
        .step(StepSpec::new("c", ScriptedStep::ok()).next("c"))
        .build();
    assert_matches!(result, Err(ChainBuildError::Cycle { step }) if step == "c");
}

#[test]
fn builder_rejects_reads_before_writes() {
    let result = TaskChainBuilder::<()>::new("unordered")
        .step(StepSpec::new("a", ScriptedStep::ok()).reads(&[RUN_NUMBER.name()]).next("b"))
        .step(StepSpec::new("b", ScriptedStep::ok()).writes(&[RUN_NUMBER.name()]))
        .build();
    assert_matches!(result, Err(ChainBuildError::UnsatisfiedRead { step, key }) if step == "a" && key == "run_number");
}

#[rstest]
#[case(policy(None, false), 1_000, false, false)]
#[case(policy(None, false), 1_000, true, false)]
#[case(policy(Some(3), false), 2, true, false)]
#[case(policy(Some(3), false), 3, true, true)]
#[case(policy(None, true), 1, false, true)]
#[case(policy(None, true), 1, true, false)]
fn step_policy_gives_up(
    #[case] policy: StepPolicy,
    #[case] attempts: u32,
    #[case] retryable: bool,
    #[case] expected: bool,
) {
    let error = if retryable { TaskError::retryable("later") } else { TaskError::failed("broken") };
    assert_eq!(policy.gives_up(attempts, &error), expected);
}

#[rstest]
#[tokio::test]
async fn successful_step_advances_and_persists(account: AccountId, test_jobs: TestJobs) {
    let job_id = test_jobs.seed_job(account, JobStatus::Pending).await;
    let first = ScriptedStep::ok().writing();
    let chain = three_steps(first.clone(), ScriptedStep::ok(), ScriptedStep::ok());
    let runner = runner(chain, &test_jobs, StepPolicy::default());
    let mut run = ChainRun::new(runner.chain());

    let outcome = runner.run_step(&account, &job_id, &(), &mut run).await.unwrap();

    assert_eq!(outcome, StepOutcome::Advanced { next: "second".to_string() });
    assert_eq!(run.overrides.get(&RUN_NUMBER).unwrap(), 1);
    let job = test_jobs.service.get_job(&account, &job_id).await.unwrap();
    assert_eq!(job.task_status["first"], JobStatus::Success);
    assert!(job.values.contains_key(CHAIN_RUN_KEY));
    assert_eq!(runner.load(&account, &job_id).await.unwrap(), run);
}

/// Overrides written by a failed attempt never reach the next attempt.
#[rstest]
#[tokio::test]
async fn failed_attempt_discards_overrides(account: AccountId, test_jobs: TestJobs) {
    let job_id = test_jobs.seed_job(account, JobStatus::Pending).await;
    let first = ScriptedStep::failing(1, true).writing();
    let runner = runner(three_steps(first, ScriptedStep::ok(), ScriptedStep::ok()), &test_jobs, StepPolicy::default());
    let mut run = ChainRun::new(runner.chain());

    let outcome = runner.run_step(&account, &job_id, &(), &mut run).await.unwrap();

    assert_matches!(
        outcome,
        StepOutcome::Retry { ref step, attempt: 1, ref reason } if step == "first" && reason == "not yet, run 1"
    );
    assert!(run.overrides.is_empty());
    assert_eq!(run.step.as_deref(), Some("first"));
    let job = test_jobs.service.get_job(&account, &job_id).await.unwrap();
    assert_eq!(job.task_status["first"], JobStatus::Pending);
    assert_eq!(job.last_log().unwrap().message, "not yet, run 1");

    runner.run_step(&account, &job_id, &(), &mut run).await.unwrap();
    assert_eq!(run.overrides.get(&RUN_NUMBER).unwrap(), 2);
    assert_eq!(run.attempts, 0);
}

/// Without a ceiling every error is retried, terminal ones included.
#[rstest]
#[tokio::test]
async fn default_policy_retries_until_success(account: AccountId, test_jobs: TestJobs) {
    let job_id = test_jobs.seed_job(account, JobStatus::Pending).await;
    let second = ScriptedStep::failing(2, false);
    let chain = three_steps(ScriptedStep::ok().writing(), second.clone(), ScriptedStep::ok());
    let runner = runner(chain, &test_jobs, StepPolicy::default());

    let run = runner.start(&account, &job_id, &()).await.unwrap();

    assert!(run.is_complete());
    assert_eq!(second.runs(), 3);
    let job = test_jobs.service.get_job(&account, &job_id).await.unwrap();
    assert!(["first", "second", "third"].iter().all(|step| job.task_status[*step] == JobStatus::Success));
}

#[rstest]
#[tokio::test]
async fn max_attempts_ends_the_chain(account: AccountId, test_jobs: TestJobs) {
    let job_id = test_jobs.seed_job(account, JobStatus::Pending).await;
    let third = ScriptedStep::ok();
    let runner = runner(
        three_steps(ScriptedStep::ok().writing(), ScriptedStep::failing(10, true), third.clone()),
        &test_jobs,
        policy(Some(3), false),
    );

    let result = runner.start(&account, &job_id, &()).await;

    assert_matches!(result, Err(TaskError::RetriesExhausted { step, attempts: 3, .. }) if step == "second");
    assert_eq!(third.runs(), 0);
    let job = test_jobs.service.get_job(&account, &job_id).await.unwrap();
    assert_eq!(job.task_status["second"], JobStatus::Failed);
}

#[rstest]
#[tokio::test]
async fn fail_fast_returns_the_step_error(account: AccountId, test_jobs: TestJobs) {
    let job_id = test_jobs.seed_job(account, JobStatus::Pending).await;
    let chain = three_steps(ScriptedStep::failing(1, false), ScriptedStep::ok(), ScriptedStep::ok());
    let runner = runner(chain, &test_jobs, policy(None, true));

    let result = runner.start(&account, &job_id, &()).await;

    assert_matches!(result, Err(TaskError::Failed(message)) if message == "broken, run 1");
}

/// A resumed run continues at the recorded step without re-running completed ones.
#[rstest]
#[tokio::test]
async fn resume_continues_at_recorded_step(account: AccountId, test_jobs: TestJobs) {
    let job_id = test_jobs.seed_job(account, JobStatus::Pending).await;
    let first = ScriptedStep::ok().writing();
    let second = ScriptedStep::failing(1, true);
    let third = ScriptedStep::ok();

    let interrupted =
        runner(three_steps(first.clone(), second.clone(), third.clone()), &test_jobs, policy(Some(1), false));
    assert_matches!(interrupted.start(&account, &job_id, &()).await, Err(TaskError::RetriesExhausted { .. }));

    let recorded = interrupted.load(&account, &job_id).await.unwrap();
    assert_eq!(recorded.step.as_deref(), Some("second"));
    assert_eq!(recorded.overrides.get(&RUN_NUMBER).unwrap(), 1);

    let resumed = runner(three_steps(first.clone(), second.clone(), third.clone()), &test_jobs, StepPolicy::default());
    let run = resumed.resume(&account, &job_id, &()).await.unwrap();

    assert!(run.is_complete());
    assert_eq!(first.runs(), 1);
    assert_eq!(second.runs(), 2);
    assert_eq!(third.runs(), 1);
}

#[rstest]
#[tokio::test]
async fn dispatch_runs_one_step(account: AccountId, test_jobs: TestJobs) {
    let job_id = test_jobs.seed_job(account, JobStatus::Pending).await;
    let second = ScriptedStep::ok();
    let chain = three_steps(ScriptedStep::ok().writing(), second.clone(), ScriptedStep::ok());
    let runner = runner(chain, &test_jobs, StepPolicy::default());
    let mut run = ChainRun::new(runner.chain());
    runner.run_step(&account, &job_id, &(), &mut run).await.unwrap();

    let outcome = runner.dispatch(&account, &job_id, &()).await.unwrap();

    assert_eq!(outcome, StepOutcome::Advanced { next: "third".to_string() });
    assert_eq!(second.runs(), 1);
}

#[rstest]
#[tokio::test]
async fn load_rejects_other_chain(account: AccountId, test_jobs: TestJobs) {
    let job_id = test_jobs.seed_job(account, JobStatus::Pending).await;
    let other =
        TaskChainBuilder::<()>::new("other chain").step(StepSpec::new("only", ScriptedStep::ok())).build().unwrap();
    runner(other, &test_jobs, StepPolicy::default()).start(&account, &job_id, &()).await.unwrap();

    let chain = three_steps(ScriptedStep::ok(), ScriptedStep::ok(), ScriptedStep::ok());
    let mine = runner(chain, &test_jobs, StepPolicy::default());
    let result = mine.load(&account, &job_id).await;

    assert_matches!(result, Err(TaskError::Failed(message)) if message.contains("other chain"));
}

#[rstest]
#[tokio::test]
async fn load_without_run_fails(account: AccountId, test_jobs: TestJobs) {
    let job_id = test_jobs.seed_job(account, JobStatus::Pending).await;
    let chain = three_steps(ScriptedStep::ok(), ScriptedStep::ok(), ScriptedStep::ok());
    let runner = runner(chain, &test_jobs, StepPolicy::default());

    assert_matches!(runner.load(&account, &job_id).await, Err(TaskError::Failed(_)));
    assert_matches!(runner.load(&account, &JobId::new()).await, Err(TaskError::Job(_)));
}
