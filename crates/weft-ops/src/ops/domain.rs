//! Remote accessors of projects, runs and run queues.
//!
//! Every accessor taking a run has a second overload taking a list of runs,
//! which the remote service maps over the list.

use weft_core::Type;
use weft_runtime::registry::{Operation, Param, Signature, TagBehavior};

use crate::types::{self, PROJECT, RUN, RUN_QUEUE};

/// Returns the domain operations.
pub fn operations() -> Vec<Operation> {
    let mut operations = vec![
        Operation::remote_root(
            "root-project",
            Signature::new([
                Param::new("entityName", Type::String),
                Param::new("projectName", Type::String),
            ])
            .returns(types::project()),
        ),
        Operation::remote(
            "project-name",
            Signature::new([Param::new(PROJECT, types::project())]).returns(Type::String),
        ),
        Operation::remote(
            "project-runs",
            Signature::new([Param::new(PROJECT, types::project())])
                .returns(Type::list(types::run())),
        )
        .with_tags(TagBehavior::tag(PROJECT, PROJECT)),
        Operation::remote(
            "project-run",
            Signature::new([
                Param::new(PROJECT, types::project()),
                Param::new("runName", Type::String),
            ])
            .returns(types::run()),
        )
        .with_tags(TagBehavior::tag(PROJECT, PROJECT)),
        Operation::remote(
            "project-filteredRuns",
            Signature::new([
                Param::new(PROJECT, types::project()),
                Param::new("filter", types::maybe(Type::dict(Type::Any))),
                Param::new("order", Type::String),
            ])
            .returns(Type::list(types::run())),
        )
        .with_tags(TagBehavior::tag(PROJECT, PROJECT)),
        Operation::remote(
            "project-runQueue",
            Signature::new([
                Param::new(PROJECT, types::project()),
                Param::new("queueName", Type::String),
            ])
            .returns(types::run_queue()),
        )
        .with_tags(TagBehavior::tag(PROJECT, PROJECT)),
        Operation::remote(
            "runQueue-id",
            Signature::new([Param::new(RUN_QUEUE, types::run_queue())]).returns(Type::String),
        ),
    ];

    operations.extend(run_accessor("run-id", Type::String));
    operations.extend(run_accessor("run-name", Type::String));
    operations.extend(run_accessor("run-summary", types::summary()));
    operations.extend(run_accessor("run-history", Type::list(types::history_row())));
    operations.extend(run_accessor("run-historyLineCount", Type::Int));
    operations
}

/// A run accessor and its overload over lists of runs.
fn run_accessor(name: &str, output: Type) -> [Operation; 2] {
    [
        Operation::remote(
            name,
            Signature::new([Param::new(RUN, types::run())]).returns(output.clone()),
        )
        .with_tags(TagBehavior::tag(RUN, RUN)),
        Operation::remote(
            name,
            Signature::new([Param::new(RUN, Type::list(types::run()))])
                .returns(Type::list(output)),
        ),
    ]
}
