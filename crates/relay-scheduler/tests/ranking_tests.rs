//! Ordering properties of the task ranker.

use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use relay_core::ids::{TaskId, VersionId};
use relay_core::task::{PreviousExecution, Requester, Task, TaskGroupDefinition, TaskStatus};
use relay_scheduler::cache::{
    ExecutionHistoryCache, FailureCorrelationIndex, RankingContext, TaskGroupIndex,
};
use relay_scheduler::comparator::ComparatorError;
use relay_scheduler::fixtures::TaskBuilder;
use relay_scheduler::{RuleRegistry, TaskRanker};

fn standard_ranker() -> TaskRanker {
    TaskRanker::new(RuleRegistry::standard().unwrap().full_chain())
}

fn ranked_ids(tasks: &[Task], ctx: &RankingContext) -> Vec<String> {
    standard_ranker()
        .rank(tasks, ctx)
        .task_ids
        .into_iter()
        .map(|id| id.to_string())
        .collect()
}

/// Context where every task has history and a failure count.
fn complete_context(tasks: &[Task], groups: TaskGroupIndex) -> RankingContext {
    RankingContext::new(
        ExecutionHistoryCache::from_executions(tasks.iter().map(|t| PreviousExecution {
            task_id: t.id.clone(),
            status: TaskStatus::Success,
            time_taken_ms: 0,
        })),
        FailureCorrelationIndex::from_counts(tasks.iter().map(|t| (t.id.clone(), 0))),
        groups,
    )
}

#[test]
fn test_anti_symmetry() {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let tasks = vec![
        TaskBuilder::new("p5").priority(5).build(),
        TaskBuilder::new("deps").dependents(3).build(),
        TaskBuilder::new("commit-old")
            .requester(Requester::Commit)
            .revision_order(3)
            .build(),
        TaskBuilder::new("commit-new")
            .requester(Requester::Commit)
            .revision_order(9)
            .build(),
        TaskBuilder::new("patch")
            .requester(Requester::Patch)
            .created_at(now)
            .build(),
        TaskBuilder::new("other-project")
            .requester(Requester::Commit)
            .project("tools")
            .created_at(now - Duration::hours(1))
            .build(),
        TaskBuilder::new("lint").group("g").display_name("lint").build(),
        TaskBuilder::new("test").group("g").display_name("test").build(),
        TaskBuilder::new("stray").group("g").display_name("deploy").build(),
        TaskBuilder::new("other-build").build_id("b9").group("g").build(),
        TaskBuilder::new("generator").generate_task(true).build(),
        TaskBuilder::new("no-history").revision("r2").build(),
    ];
    let mut ctx = complete_context(
        &tasks,
        TaskGroupIndex::from_definitions(vec![(
            VersionId::from("v1"),
            vec![TaskGroupDefinition::new("g", &["lint", "build", "test"])],
        )]),
    );
    // Drop one history entry to exercise the cache-miss path.
    ctx.history = ExecutionHistoryCache::from_executions(
        tasks
            .iter()
            .filter(|t| t.id.as_str() != "no-history")
            .map(|t| PreviousExecution {
                task_id: t.id.clone(),
                status: if t.id.as_str() == "deps" {
                    TaskStatus::Failed
                } else {
                    TaskStatus::Success
                },
                time_taken_ms: 1000,
            }),
    );

    let chain = RuleRegistry::standard().unwrap().full_chain();
    for a in &tasks {
        for b in &tasks {
            assert_eq!(
                chain.compare(a, b, &ctx),
                chain.compare(b, a, &ctx).reverse(),
                "{} vs {}",
                a.id,
                b.id
            );
        }
    }
}

#[test]
fn test_ranking_is_deterministic() {
    let tasks: Vec<Task> = (0..20)
        .map(|i| {
            TaskBuilder::new(&format!("t{i:02}"))
                .priority(i % 3)
                .dependents((i % 4) as u32)
                .build()
        })
        .collect();
    let ctx = complete_context(&tasks, TaskGroupIndex::default());

    let first = standard_ranker().rank(&tasks, &ctx);
    let second = standard_ranker().rank(&tasks, &ctx);

    assert_eq!(first, second);
}

#[test]
fn test_priority_dominance() {
    let now = Utc::now();
    let tasks = vec![
        TaskBuilder::new("p1")
            .priority(1)
            .dependents(100)
            .requester(Requester::Patch)
            .created_at(now - Duration::days(3))
            .generate_task(true)
            .group("g")
            .build(),
        TaskBuilder::new("p10")
            .priority(10)
            .requester(Requester::Patch)
            .created_at(now)
            .build(),
    ];
    let ctx = complete_context(
        &tasks,
        TaskGroupIndex::from_definitions(vec![(
            VersionId::from("v1"),
            vec![TaskGroupDefinition::new("g", &["p1"])],
        )]),
    );

    assert_eq!(ranked_ids(&tasks, &ctx), vec!["p10", "p1"]);
}

#[test]
fn test_commit_age_prefers_newer_revision_in_one_project() {
    let tasks = vec![
        TaskBuilder::new("r5")
            .requester(Requester::Commit)
            .revision_order(5)
            .build(),
        TaskBuilder::new("r7")
            .requester(Requester::Commit)
            .revision_order(7)
            .build(),
    ];
    let ctx = complete_context(&tasks, TaskGroupIndex::default());

    assert_eq!(ranked_ids(&tasks, &ctx), vec!["r7", "r5"]);
}

#[test]
fn test_patch_age_prefers_older() {
    let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let t2 = t1 + Duration::minutes(30);
    let tasks = vec![
        TaskBuilder::new("late")
            .requester(Requester::Patch)
            .created_at(t2)
            .build(),
        TaskBuilder::new("early")
            .requester(Requester::Patch)
            .created_at(t1)
            .build(),
    ];
    let ctx = complete_context(&tasks, TaskGroupIndex::default());

    assert_eq!(ranked_ids(&tasks, &ctx), vec!["early", "late"]);
}

#[test]
fn test_cross_project_fairness() {
    let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let t2 = t1 + Duration::minutes(5);
    let tasks = vec![
        TaskBuilder::new("newer-high-order")
            .requester(Requester::Commit)
            .project("server")
            .revision_order(900)
            .created_at(t2)
            .build(),
        TaskBuilder::new("older-low-order")
            .requester(Requester::Commit)
            .project("tools")
            .revision_order(2)
            .created_at(t1)
            .build(),
    ];
    let ctx = complete_context(&tasks, TaskGroupIndex::default());

    assert_eq!(
        ranked_ids(&tasks, &ctx),
        vec!["older-low-order", "newer-high-order"]
    );
}

#[test]
fn test_longer_runtime_first() {
    let tasks = vec![
        TaskBuilder::new("short").build(),
        TaskBuilder::new("long").build(),
    ];
    let mut ctx = complete_context(&tasks, TaskGroupIndex::default());
    ctx.history = ExecutionHistoryCache::from_executions(vec![
        PreviousExecution {
            task_id: TaskId::from("short"),
            status: TaskStatus::Success,
            time_taken_ms: 30_000,
        },
        PreviousExecution {
            task_id: TaskId::from("long"),
            status: TaskStatus::Success,
            time_taken_ms: 600_000,
        },
    ]);

    assert_eq!(ranked_ids(&tasks, &ctx), vec!["long", "short"]);
}

#[test]
fn test_recently_failed_task_first() {
    let tasks = vec![
        TaskBuilder::new("green-a").build(),
        TaskBuilder::new("red").build(),
        TaskBuilder::new("green-b").build(),
    ];
    let mut ctx = complete_context(&tasks, TaskGroupIndex::default());
    ctx.history = ExecutionHistoryCache::from_executions(tasks.iter().map(|t| PreviousExecution {
        task_id: t.id.clone(),
        status: if t.id.as_str() == "red" {
            TaskStatus::Failed
        } else {
            TaskStatus::Success
        },
        time_taken_ms: 60_000,
    }));

    let ranking = standard_ranker().rank(&tasks, &ctx);
    let ids: Vec<&str> = ranking.task_ids.iter().map(|t| t.as_str()).collect();

    assert_eq!(ids, vec!["red", "green-a", "green-b"]);
    assert!(ranking.anomalies.is_empty());
}

#[test]
fn test_missing_failure_count_is_reported() {
    let tasks = vec![
        TaskBuilder::new("counted").build(),
        TaskBuilder::new("uncounted").build(),
    ];
    let mut ctx = complete_context(&tasks, TaskGroupIndex::default());
    ctx.failures = FailureCorrelationIndex::from_counts(vec![(TaskId::from("counted"), 2)]);

    let ranking = standard_ranker().rank(&tasks, &ctx);
    let ids: Vec<&str> = ranking.task_ids.iter().map(|t| t.as_str()).collect();

    // The miss resolves to a tie, so input order stands.
    assert_eq!(ids, vec!["counted", "uncounted"]);
    assert_eq!(ranking.anomalies.len(), 1);
    assert_eq!(ranking.anomalies[0].rule, "similar_failure");
    assert_eq!(
        ranking.anomalies[0].error,
        ComparatorError::MissingFailureCount {
            task: TaskId::from("uncounted")
        }
    );
}

#[test]
fn test_similar_failures_surface_first() {
    let tasks = vec![
        TaskBuilder::new("quiet").build(),
        TaskBuilder::new("noisy").build(),
    ];
    let mut ctx = complete_context(&tasks, TaskGroupIndex::default());
    ctx.failures = FailureCorrelationIndex::from_counts(vec![
        (TaskId::from("quiet"), 0),
        (TaskId::from("noisy"), 4),
    ]);

    assert_eq!(ranked_ids(&tasks, &ctx), vec!["noisy", "quiet"]);
}

#[test]
fn test_task_group_contiguity() {
    let mut history = Vec::new();
    let mut tasks = Vec::new();
    // Interleave builds and give "test" the longest runtime so earlier
    // rules would split the group if nothing kept it together.
    for (name, runtime) in [("test", 900_000), ("lint", 10_000), ("build", 300_000)] {
        for build in ["b2", "b1"] {
            let id = format!("{build}-{name}");
            tasks.push(
                TaskBuilder::new(&id)
                    .build_id(build)
                    .group("lint-build-test")
                    .display_name(name)
                    .build(),
            );
            history.push(PreviousExecution {
                task_id: TaskId::from(id.as_str()),
                status: TaskStatus::Success,
                time_taken_ms: runtime,
            });
        }
    }
    tasks.insert(2, TaskBuilder::new("loose-a").build());
    tasks.push(TaskBuilder::new("loose-b").build());

    let mut ctx = complete_context(
        &tasks,
        TaskGroupIndex::from_definitions(vec![(
            VersionId::from("v1"),
            vec![TaskGroupDefinition::new(
                "lint-build-test",
                &["lint", "build", "test"],
            )],
        )]),
    );
    ctx.history = ExecutionHistoryCache::from_executions(history);

    let order = ranked_ids(&tasks, &ctx);

    for build in ["b1", "b2"] {
        let start = order
            .iter()
            .position(|id| id.starts_with(build))
            .expect("build present");
        assert_eq!(
            order[start..start + 3].to_vec(),
            vec![
                format!("{build}-lint"),
                format!("{build}-build"),
                format!("{build}-test"),
            ]
        );
    }
    assert_eq!(order.len(), tasks.len());
    // Equal members of different builds: the greater (build, group) key leads.
    assert_eq!(order[0], "b2-lint");
}

#[test]
fn test_distinct_groups_order_by_descending_key() {
    let tasks = vec![
        TaskBuilder::new("a-setup").build_id("build-a").group("setup").build(),
        TaskBuilder::new("b-setup").build_id("build-b").group("setup").build(),
        TaskBuilder::new("b-deploy").build_id("build-b").group("deploy").build(),
    ];
    let ctx = complete_context(
        &tasks,
        TaskGroupIndex::from_definitions(vec![(
            VersionId::from("v1"),
            vec![
                TaskGroupDefinition::new("setup", &["a-setup", "b-setup"]),
                TaskGroupDefinition::new("deploy", &["b-deploy"]),
            ],
        )]),
    );

    assert_eq!(
        ranked_ids(&tasks, &ctx),
        vec!["b-setup", "b-deploy", "a-setup"]
    );
}

#[test]
fn test_missing_history_is_tolerated() {
    let tasks = vec![
        TaskBuilder::new("new-variant").build(),
        TaskBuilder::new("generator").generate_task(true).build(),
    ];

    let ranking = standard_ranker().rank(&tasks, &RankingContext::default());

    let ids: Vec<&str> = ranking.task_ids.iter().map(|t| t.as_str()).collect();
    assert_eq!(ids, vec!["generator", "new-variant"]);
    assert!(!ranking.anomalies.is_empty());
    assert!(ranking.anomalies.iter().all(|a| a.error.is_cache_miss()));
}

#[test]
fn test_generated_task_precedence() {
    let tasks = vec![
        TaskBuilder::new("plain").build(),
        TaskBuilder::new("generator").generate_task(true).build(),
    ];
    let ctx = complete_context(&tasks, TaskGroupIndex::default());

    assert_eq!(ranked_ids(&tasks, &ctx), vec!["generator", "plain"]);
}

#[test]
fn test_end_to_end_scenario() {
    let tasks = vec![
        TaskBuilder::new("T1").dependents(2).build(),
        TaskBuilder::new("T2").dependents(5).build(),
        TaskBuilder::new("T3").priority(5).build(),
        TaskBuilder::new("T4").build_id("B").group("G").display_name("T4").build(),
        TaskBuilder::new("T5").build_id("B").group("G").display_name("T5").build(),
    ];
    let ctx = complete_context(
        &tasks,
        TaskGroupIndex::from_definitions(vec![(
            VersionId::from("v1"),
            vec![TaskGroupDefinition::new("G", &["T4", "T5"])],
        )]),
    );

    let ranking = standard_ranker().rank(&tasks, &ctx);
    let ids: Vec<&str> = ranking.task_ids.iter().map(|t| t.as_str()).collect();

    assert_eq!(ids, vec!["T3", "T2", "T1", "T4", "T5"]);
    assert!(ranking.anomalies.is_empty());
}

#[test]
fn test_misconfigured_group_member_does_not_abort() {
    let tasks = vec![
        TaskBuilder::new("stray").group("g").display_name("deploy").build(),
        TaskBuilder::new("lint").group("g").display_name("lint").build(),
    ];
    let ctx = complete_context(
        &tasks,
        TaskGroupIndex::from_definitions(vec![(
            VersionId::from("v1"),
            vec![TaskGroupDefinition::new("g", &["lint"])],
        )]),
    );

    let ranking = standard_ranker().rank(&tasks, &ctx);
    let ids: Vec<&str> = ranking.task_ids.iter().map(|t| t.as_str()).collect();

    assert_eq!(ids, vec!["lint", "stray"]);
    assert_eq!(ranking.anomalies.len(), 1);
    assert_eq!(ranking.anomalies[0].rule, "task_group");
}
