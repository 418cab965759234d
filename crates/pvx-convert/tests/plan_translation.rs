//! Node-level translation tests.
//!
//! Each test builds a small logical plan the way the coordinator would ship it,
//! translates it with the default expression converter, and checks the shape of
//! the physical plan.
//!
//! ## What These Tests Verify
//! - Every translated node produces the column names its logical node declares,
//!   except semi and anti joins, which drop the marker column
//! - `Filter` over `SemiJoin` collapses into semi, anti or mark joins
//! - The `OFFSET` chain folds into one `Limit`, and only when the shape matches
//! - Local exchanges rename their sources and pick the right partition function
//! - Task-scoped values (unique id prefix) come from the task id

use pvx_convert::patterns;
use pvx_convert::{ConvertError, ConverterConfig, PlanConverter, RowExpressionConverter, TranslationContext};
use pvx_core::plan::{self as physical, LocalPartitionType, PartitionFunctionSpec, PlanNode, PlanNodeRef};
use pvx_core::types::Type;
use pvx_core::value::ScalarValue;
use pvx_protocol::block::{Block, BlockValue};
use pvx_protocol::connector::{
    ColumnHandle, ConnectorTableHandle, ConnectorTableLayoutHandle, TableHandle,
    TpchColumnHandle, TpchTableHandle, TpchTableLayoutHandle,
};
use pvx_protocol::expr::{
    CallExpression, ConstantExpression, FunctionHandle, FunctionKind, RowExpression, Signature,
    Variable,
};
use pvx_protocol::partitioning::{
    ConnectorPartitioningHandle, Partitioning, PartitioningHandle, PartitioningScheme,
    SystemPartitionFunction, SystemPartitioning,
};
use pvx_protocol::plan::*;
use pvx_protocol::task_id::TaskId;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn var(name: &str, ty: &str) -> Variable {
    Variable::new(name, ty)
}

fn bigints(names: &[&str]) -> Vec<Variable> {
    names.iter().map(|n| var(n, "bigint")).collect()
}

fn bigint(value: i64) -> RowExpression {
    RowExpression::Constant(ConstantExpression {
        value_block: Block::encode(&BlockValue::Long(value)),
        type_signature: "bigint".into(),
    })
}

fn builtin(name: &str, kind: FunctionKind, return_type: &str, arguments: Vec<RowExpression>) -> RowExpression {
    RowExpression::Call(CallExpression {
        display_name: name.rsplit('.').next().unwrap_or(name).into(),
        function_handle: FunctionHandle::BuiltIn {
            signature: Signature {
                name: name.into(),
                kind,
                return_type: return_type.into(),
                argument_types: arguments.iter().map(|a| a.type_signature().to_string()).collect(),
            },
        },
        return_type: return_type.into(),
        arguments,
    })
}

fn call(expr: RowExpression) -> CallExpression {
    match expr {
        RowExpression::Call(call) => call,
        other => panic!("not a call: {:?}", other),
    }
}

fn values(id: &str, names: &[&str]) -> LogicalPlanNode {
    LogicalPlanNode::Values(ValuesNode {
        id: id.into(),
        output_variables: bigints(names),
        rows: vec![
            names.iter().map(|_| bigint(1)).collect(),
            names.iter().map(|_| bigint(2)).collect(),
        ],
    })
}

fn orders_scan(id: &str) -> LogicalPlanNode {
    let table = TpchTableHandle {
        table_name: "orders".into(),
        scale_factor: 0.01,
    };
    let columns = [("o_orderkey", "bigint"), ("o_comment", "varchar(79)")];
    LogicalPlanNode::TableScan(TableScanNode {
        id: id.into(),
        table: TableHandle {
            connector_id: "tpch".into(),
            connector_handle: ConnectorTableHandle::Tpch(table.clone()),
            connector_table_layout: Some(ConnectorTableLayoutHandle::Tpch(TpchTableLayoutHandle {
                table,
            })),
        },
        output_variables: columns.iter().map(|(n, t)| var(n, t)).collect(),
        assignments: columns
            .iter()
            .map(|(n, t)| ColumnAssignment {
                variable: var(n, t),
                column_handle: ColumnHandle::Tpch(TpchColumnHandle {
                    column_name: n.to_string(),
                    type_signature: t.to_string(),
                }),
            })
            .collect(),
    })
}

fn identity(id: &str, variables: Vec<Variable>, source: LogicalPlanNode) -> LogicalPlanNode {
    LogicalPlanNode::Project(ProjectNode {
        id: id.into(),
        source: Box::new(source),
        assignments: variables
            .into_iter()
            .map(|v| Assignment {
                expression: v.clone().into(),
                variable: v,
            })
            .collect(),
    })
}

fn scheme(
    partitioning: SystemPartitioning,
    function: SystemPartitionFunction,
    layout: Vec<Variable>,
    arguments: Vec<RowExpression>,
) -> PartitioningScheme {
    PartitioningScheme {
        partitioning: Partitioning {
            handle: PartitioningHandle {
                connector_id: None,
                connector_handle: ConnectorPartitioningHandle::system(partitioning, function),
            },
            arguments,
        },
        output_layout: layout,
        hash_column: None,
        replicate_nulls_and_any: false,
        bucket_to_partition: None,
    }
}

fn exchange(
    id: &str,
    exchange_type: ExchangeType,
    scheme: PartitioningScheme,
    sources: Vec<LogicalPlanNode>,
) -> LogicalPlanNode {
    let inputs = sources.iter().map(|s| s.output_variables()).collect();
    LogicalPlanNode::Exchange(ExchangeNode {
        id: id.into(),
        exchange_type,
        scope: ExchangeScope::Local,
        partitioning_scheme: scheme,
        sources,
        inputs,
        ensure_source_ordering: false,
        ordering_scheme: None,
    })
}

/// Single-source local gather, as the coordinator inserts between stages of the
/// `OFFSET` chain.
fn local_gather(id: &str, source: LogicalPlanNode) -> LogicalPlanNode {
    let layout = source.output_variables();
    exchange(
        id,
        ExchangeType::Gather,
        scheme(SystemPartitioning::Single, SystemPartitionFunction::Single, layout, vec![]),
        vec![source],
    )
}

fn local_round_robin(id: &str, source: LogicalPlanNode) -> LogicalPlanNode {
    let layout = source.output_variables();
    exchange(
        id,
        ExchangeType::Repartition,
        scheme(SystemPartitioning::Fixed, SystemPartitionFunction::RoundRobin, layout, vec![]),
        vec![source],
    )
}

fn semi_join(id: &str) -> SemiJoinNode {
    SemiJoinNode {
        id: id.into(),
        source: Box::new(values("1", &["a", "b"])),
        filtering_source: Box::new(values("2", &["c"])),
        source_join_variable: var("a", "bigint"),
        filtering_source_join_variable: var("c", "bigint"),
        semi_join_output: var("m", "boolean"),
    }
}

fn filter(id: &str, predicate: RowExpression, source: LogicalPlanNode) -> LogicalPlanNode {
    LogicalPlanNode::Filter(FilterNode {
        id: id.into(),
        source: Box::new(source),
        predicate,
    })
}

/// `SELECT a FROM t OFFSET 5 LIMIT 10` as shipped to a worker.
fn offset_limit_plan() -> LogicalPlanNode {
    let row_number = LogicalPlanNode::RowNumber(RowNumberNode {
        id: "2".into(),
        source: Box::new(values("1", &["a"])),
        partition_by: vec![],
        row_number_variable: var("rn", "bigint"),
        max_row_count_per_partition: None,
        partial: false,
    });
    let greater_than = builtin(
        "presto.default.$operator$greater_than",
        FunctionKind::Scalar,
        "boolean",
        vec![var("rn", "bigint").into(), bigint(5)],
    );
    let filtered = filter("4", greater_than, local_gather("3", row_number));
    let limit = LogicalPlanNode::Limit(LimitNode {
        id: "6".into(),
        source: Box::new(local_gather("5", filtered)),
        count: 10,
        step: LimitStep::Final,
    });
    identity("8", bigints(&["a"]), local_round_robin("7", limit))
}

fn task() -> TaskId {
    TaskId::parse("20261016_000000_00001_pvx.3.0.5.0").unwrap()
}

fn translate(node: &LogicalPlanNode) -> Result<PlanNodeRef, ConvertError> {
    let exprs = RowExpressionConverter;
    let converter = PlanConverter::new(&exprs, ConverterConfig::interactive());
    let task_id = task();
    converter.to_physical_plan(node, &TranslationContext::new(&task_id))
}

fn names(node: &PlanNode) -> Vec<String> {
    node.output_type().names().to_vec()
}

fn logical_names(node: &LogicalPlanNode) -> Vec<String> {
    node.output_variables().into_iter().map(|v| v.name).collect()
}

fn assert_same_names(node: &LogicalPlanNode) -> PlanNodeRef {
    let physical = translate(node).unwrap();
    assert_eq!(
        names(&physical),
        logical_names(node),
        "{} translated to {} with different outputs",
        node.kind_name(),
        physical.name()
    );
    physical
}

fn count_kind(node: &PlanNode, kind: &str) -> usize {
    let mut count = 0;
    node.walk(&mut |n| {
        if n.name() == kind {
            count += 1;
        }
    });
    count
}

// ---------------------------------------------------------------------------
// Output names per node kind
// ---------------------------------------------------------------------------

#[test]
fn test_values_and_scan_outputs() {
    let physical = assert_same_names(&values("1", &["a", "b"]));
    let PlanNode::Values(values) = physical.as_ref() else {
        panic!("expected values");
    };
    assert_eq!(values.values.len(), 2);
    assert_eq!(values.values[1].row(0).unwrap(), vec![&ScalarValue::Bigint(2), &ScalarValue::Bigint(2)]);

    let physical = assert_same_names(&orders_scan("0"));
    let PlanNode::TableScan(scan) = physical.as_ref() else {
        panic!("expected table scan");
    };
    assert_eq!(scan.assignments.len(), 2);
    assert_eq!(scan.output_type.type_of("o_comment"), Some(&Type::Varchar));
}

#[test]
fn test_non_constant_values_row_is_unsupported() {
    let node = LogicalPlanNode::Values(ValuesNode {
        id: "1".into(),
        output_variables: bigints(&["a"]),
        rows: vec![vec![var("x", "bigint").into()]],
    });
    assert!(matches!(translate(&node), Err(ConvertError::Unsupported(_))));
}

#[test]
fn test_project_filter_and_limit_outputs() {
    let project = LogicalPlanNode::Project(ProjectNode {
        id: "2".into(),
        source: Box::new(values("1", &["a", "b"])),
        assignments: vec![
            Assignment {
                variable: var("b", "bigint"),
                expression: var("b", "bigint").into(),
            },
            Assignment {
                variable: var("ten", "bigint"),
                expression: bigint(10),
            },
        ],
    });
    assert_same_names(&project);

    let filtered = filter(
        "3",
        builtin(
            "presto.default.$operator$greater_than",
            FunctionKind::Scalar,
            "boolean",
            vec![var("a", "bigint").into(), bigint(0)],
        ),
        values("1", &["a"]),
    );
    assert_same_names(&filtered);

    let limit = LogicalPlanNode::Limit(LimitNode {
        id: "4".into(),
        source: Box::new(values("1", &["a"])),
        count: 3,
        step: LimitStep::Partial,
    });
    let physical = assert_same_names(&limit);
    let PlanNode::Limit(limit) = physical.as_ref() else {
        panic!("expected limit");
    };
    assert!(limit.is_partial);
    assert_eq!((limit.offset, limit.count), (0, 3));
}

#[test]
fn test_aggregation_outputs() {
    let sum = builtin("presto.default.sum", FunctionKind::Aggregate, "bigint", vec![var("b", "bigint").into()]);
    let node = LogicalPlanNode::Aggregation(AggregationNode {
        id: "2".into(),
        source: Box::new(values("1", &["a", "b"])),
        aggregations: vec![AggregationAssignment {
            variable: var("total", "bigint"),
            call: call(sum),
            mask: None,
        }],
        grouping_sets: GroupingSetDescriptor {
            grouping_keys: bigints(&["a"]),
            grouping_set_count: 1,
            global_grouping_sets: vec![],
        },
        pre_grouped_variables: bigints(&["a"]),
        step: AggregationStep::Partial,
        hash_variable: None,
        group_id_variable: None,
    });
    let physical = assert_same_names(&node);
    let PlanNode::Aggregation(aggregation) = physical.as_ref() else {
        panic!("expected aggregation");
    };
    assert_eq!(aggregation.step, physical::AggregationStep::Partial);
    assert_eq!(aggregation.pre_grouped_keys.len(), 1);
    assert!(!aggregation.ignore_null_keys);
}

#[test]
fn test_pre_grouped_keys_dropped_with_global_sets() {
    let node = LogicalPlanNode::Aggregation(AggregationNode {
        id: "2".into(),
        source: Box::new(values("1", &["a"])),
        aggregations: vec![],
        grouping_sets: GroupingSetDescriptor {
            grouping_keys: bigints(&["a"]),
            grouping_set_count: 2,
            global_grouping_sets: vec![1],
        },
        pre_grouped_variables: bigints(&["a"]),
        step: AggregationStep::Single,
        hash_variable: None,
        group_id_variable: None,
    });
    let physical = translate(&node).unwrap();
    let PlanNode::Aggregation(aggregation) = physical.as_ref() else {
        panic!("expected aggregation");
    };
    assert!(aggregation.pre_grouped_keys.is_empty());
    assert_eq!(aggregation.step, physical::AggregationStep::Single);
}

#[test]
fn test_group_id_outputs() {
    let node = LogicalPlanNode::GroupId(GroupIdNode {
        id: "2".into(),
        source: Box::new(values("1", &["a", "b", "c"])),
        grouping_sets: vec![bigints(&["a$gid", "b$gid"]), bigints(&["a$gid"]), vec![]],
        grouping_columns: vec![
            GroupingColumn {
                output: var("a$gid", "bigint"),
                input: var("a", "bigint"),
            },
            GroupingColumn {
                output: var("b$gid", "bigint"),
                input: var("b", "bigint"),
            },
        ],
        aggregation_arguments: bigints(&["c"]),
        group_id_variable: var("groupid", "bigint"),
    });
    let physical = assert_same_names(&node);
    let PlanNode::GroupId(group_id) = physical.as_ref() else {
        panic!("expected group id");
    };
    assert_eq!(group_id.grouping_sets[0][0].name, "a");
    assert_eq!(group_id.grouping_sets[2].len(), 0);
}

#[test]
fn test_group_id_unknown_output_fails() {
    let node = LogicalPlanNode::GroupId(GroupIdNode {
        id: "2".into(),
        source: Box::new(values("1", &["a"])),
        grouping_sets: vec![bigints(&["nope"])],
        grouping_columns: vec![],
        aggregation_arguments: vec![],
        group_id_variable: var("groupid", "bigint"),
    });
    assert!(matches!(translate(&node), Err(ConvertError::InvalidInput(_))));
}

#[test]
fn test_distinct_limit_becomes_limit_over_aggregation() {
    let node = LogicalPlanNode::DistinctLimit(DistinctLimitNode {
        id: "2".into(),
        source: Box::new(values("1", &["a", "b"])),
        limit: 7,
        partial: true,
        distinct_variables: bigints(&["b"]),
        hash_variable: None,
    });
    let physical = assert_same_names(&node);
    let PlanNode::Limit(limit) = physical.as_ref() else {
        panic!("expected limit");
    };
    assert_eq!(limit.id, "2.limit");
    assert_eq!(limit.count, 7);
    assert!(limit.is_partial);
    let PlanNode::Aggregation(aggregation) = limit.source.as_ref() else {
        panic!("expected aggregation");
    };
    assert_eq!(aggregation.id, "2");
    assert!(aggregation.aggregates.is_empty());
}

#[test]
fn test_joins() {
    let join = |join_type, criteria: Vec<EquiJoinClause>| JoinNode {
        id: "3".into(),
        join_type,
        left: Box::new(values("1", &["a", "b"])),
        right: Box::new(values("2", &["c"])),
        criteria,
        output_variables: bigints(&["b", "c"]),
        filter: None,
    };
    let clause = EquiJoinClause {
        left: var("a", "bigint"),
        right: var("c", "bigint"),
    };

    let cross = assert_same_names(&LogicalPlanNode::Join(join(JoinType::Inner, vec![])));
    assert!(matches!(cross.as_ref(), PlanNode::NestedLoopJoin(_)));

    let left = assert_same_names(&LogicalPlanNode::Join(join(JoinType::Left, vec![clause.clone()])));
    let PlanNode::HashJoin(hash) = left.as_ref() else {
        panic!("expected hash join");
    };
    assert_eq!(hash.join_type, physical::JoinType::Left);
    assert!(!hash.null_aware);
    assert_eq!(hash.left_keys[0].name, "a");

    let merge = assert_same_names(&LogicalPlanNode::MergeJoin(join(JoinType::Inner, vec![clause])));
    assert!(matches!(merge.as_ref(), PlanNode::MergeJoin(_)));
}

#[test]
fn test_window_outputs() {
    let rank = builtin("presto.default.rank", FunctionKind::Window, "bigint", vec![]);
    let window = |frame_type| {
        LogicalPlanNode::Window(WindowNode {
            id: "2".into(),
            source: Box::new(values("1", &["a", "b"])),
            specification: Specification {
                partition_by: bigints(&["a"]),
                ordering_scheme: Some(OrderingScheme {
                    order_by: vec![Ordering {
                        variable: var("b", "bigint"),
                        sort_order: SortOrder::DescNullsLast,
                    }],
                }),
            },
            window_functions: vec![WindowFunctionAssignment {
                variable: var("r", "bigint"),
                function: WindowFunction {
                    function_call: call(rank.clone()),
                    frame: Frame {
                        frame_type,
                        start_type: FrameBoundType::UnboundedPreceding,
                        start_value: None,
                        end_type: FrameBoundType::CurrentRow,
                        end_value: None,
                    },
                    ignore_nulls: false,
                },
            }],
        })
    };

    let physical = assert_same_names(&window(WindowType::Range));
    let PlanNode::Window(node) = physical.as_ref() else {
        panic!("expected window");
    };
    assert_eq!(node.sorting_orders, vec![physical::SortOrder::DESC_NULLS_LAST]);

    assert!(matches!(
        translate(&window(WindowType::Groups)),
        Err(ConvertError::Unsupported(_))
    ));
}

#[test]
fn test_sort_top_n_and_unnest_outputs() {
    let ordering = OrderingScheme {
        order_by: vec![Ordering {
            variable: var("a", "bigint"),
            sort_order: SortOrder::AscNullsFirst,
        }],
    };
    let sort = LogicalPlanNode::Sort(SortNode {
        id: "2".into(),
        source: Box::new(values("1", &["a"])),
        ordering_scheme: ordering.clone(),
        is_partial: false,
    });
    assert!(matches!(assert_same_names(&sort).as_ref(), PlanNode::OrderBy(_)));

    let top_n = LogicalPlanNode::TopN(TopNNode {
        id: "3".into(),
        source: Box::new(values("1", &["a"])),
        count: 5,
        ordering_scheme: ordering,
        step: TopNStep::Partial,
    });
    let physical = assert_same_names(&top_n);
    let PlanNode::TopN(top_n) = physical.as_ref() else {
        panic!("expected top n");
    };
    assert!(top_n.is_partial);
    assert_eq!(top_n.sorting_orders, vec![physical::SortOrder::ASC_NULLS_FIRST]);

    let source = LogicalPlanNode::Values(ValuesNode {
        id: "1".into(),
        output_variables: vec![var("k", "bigint"), var("m", "map(varchar,double)")],
        rows: vec![],
    });
    let unnest = LogicalPlanNode::Unnest(UnnestNode {
        id: "4".into(),
        source: Box::new(source),
        replicate_variables: bigints(&["k"]),
        unnest_variables: vec![UnnestAssignment {
            input: var("m", "map(varchar,double)"),
            outputs: vec![var("mk", "varchar"), var("mv", "double")],
        }],
        ordinality_variable: Some(var("ord", "bigint")),
    });
    let physical = assert_same_names(&unnest);
    assert_eq!(physical.output_type().type_of("mv"), Some(&Type::Double));
}

#[test]
fn test_task_scoped_nodes() {
    let unique = LogicalPlanNode::AssignUniqueId(AssignUniqueIdNode {
        id: "2".into(),
        source: Box::new(values("1", &["a"])),
        id_variable: var("unique", "bigint"),
    });
    let physical = assert_same_names(&unique);
    let PlanNode::AssignUniqueId(node) = physical.as_ref() else {
        panic!("expected assign unique id");
    };
    // Stage 3, task 5.
    assert_eq!(node.task_unique_id, (3 << 14) | 5);

    let single = LogicalPlanNode::EnforceSingleRow(EnforceSingleRowNode {
        id: "3".into(),
        source: Box::new(values("1", &["a"])),
    });
    assert_same_names(&single);

    let row_number = LogicalPlanNode::RowNumber(RowNumberNode {
        id: "4".into(),
        source: Box::new(values("1", &["a"])),
        partition_by: bigints(&["a"]),
        row_number_variable: var("rn", "bigint"),
        max_row_count_per_partition: Some(3),
        partial: false,
    });
    let physical = assert_same_names(&row_number);
    let PlanNode::RowNumber(node) = physical.as_ref() else {
        panic!("expected row number");
    };
    assert_eq!(node.limit, Some(3));
}

#[test]
fn test_remote_sources() {
    let ordered = LogicalPlanNode::RemoteSource(RemoteSourceNode {
        id: "9".into(),
        source_fragment_ids: vec!["1".into()],
        output_variables: bigints(&["a"]),
        ensure_source_ordering: true,
        ordering_scheme: Some(OrderingScheme {
            order_by: vec![Ordering {
                variable: var("a", "bigint"),
                sort_order: SortOrder::AscNullsLast,
            }],
        }),
        exchange_type: ExchangeType::Gather,
    });
    assert!(matches!(assert_same_names(&ordered).as_ref(), PlanNode::MergeExchange(_)));

    let exprs = RowExpressionConverter;
    let batch = PlanConverter::new(&exprs, ConverterConfig::batch("local", None));
    let task_id = task();
    let physical = batch
        .to_physical_plan(&ordered, &TranslationContext::new(&task_id))
        .unwrap();
    assert!(matches!(physical.as_ref(), PlanNode::ShuffleRead(_)));
}

#[test]
fn test_nested_output_node_is_rejected() {
    let output = LogicalPlanNode::Output(OutputNode {
        id: "2".into(),
        source: Box::new(values("1", &["a"])),
        column_names: vec!["a".into()],
        output_variables: bigints(&["a"]),
    });
    assert!(matches!(translate(&output), Err(ConvertError::UnsupportedPlanNode(_))));
}

// ---------------------------------------------------------------------------
// Semi joins
// ---------------------------------------------------------------------------

#[test]
fn test_filter_on_marker_becomes_semi_join() {
    let node = filter("4", var("m", "boolean").into(), LogicalPlanNode::SemiJoin(semi_join("3")));
    let physical = translate(&node).unwrap();
    let PlanNode::HashJoin(join) = physical.as_ref() else {
        panic!("expected hash join, got {}", physical.name());
    };
    assert_eq!(join.id, "3");
    assert_eq!(join.join_type, physical::JoinType::LeftSemiFilter);
    assert!(!join.null_aware);
    assert_eq!(names(&physical), vec!["a", "b"]);
    assert_eq!(count_kind(&physical, "ProjectNode"), 0);
}

#[test]
fn test_semi_join_lowering_drops_marker_column() {
    let node = filter("4", var("m", "boolean").into(), LogicalPlanNode::SemiJoin(semi_join("3")));
    assert_eq!(logical_names(&node), vec!["a", "b", "m"]);
    let physical = translate(&node).unwrap();
    assert!(!names(&physical).contains(&"m".to_string()));
}

#[test]
fn test_filter_on_negated_marker_becomes_anti_join() {
    let negated = builtin(
        "presto.default.not",
        FunctionKind::Scalar,
        "boolean",
        vec![var("m", "boolean").into()],
    );
    let node = filter("4", negated, LogicalPlanNode::SemiJoin(semi_join("3")));
    let physical = translate(&node).unwrap();
    let PlanNode::HashJoin(join) = physical.as_ref() else {
        panic!("expected hash join");
    };
    assert_eq!(join.join_type, physical::JoinType::Anti);
    assert!(join.null_aware);
    assert_eq!(names(&physical), vec!["a", "b"]);
}

#[test]
fn test_other_predicates_keep_mark_join() {
    let semi = LogicalPlanNode::SemiJoin(semi_join("3"));
    let physical = assert_same_names(&semi);
    let PlanNode::HashJoin(join) = physical.as_ref() else {
        panic!("expected hash join");
    };
    assert_eq!(join.join_type, physical::JoinType::LeftSemiProject);

    let predicate = builtin(
        "presto.default.$operator$greater_than",
        FunctionKind::Scalar,
        "boolean",
        vec![var("b", "bigint").into(), bigint(3)],
    );
    let node = filter("4", predicate, semi);
    let physical = assert_same_names(&node);
    let PlanNode::Filter(filter) = physical.as_ref() else {
        panic!("expected filter");
    };
    assert!(matches!(filter.source.as_ref(), PlanNode::HashJoin(j) if j.join_type == physical::JoinType::LeftSemiProject));
}

// ---------------------------------------------------------------------------
// OFFSET folding
// ---------------------------------------------------------------------------

#[test]
fn test_offset_limit_folds_into_one_limit() {
    let plan = offset_limit_plan();
    let physical = assert_same_names(&plan);
    let PlanNode::Project(project) = physical.as_ref() else {
        panic!("expected project");
    };
    assert_eq!(project.id, "8");
    let PlanNode::Limit(limit) = project.source.as_ref() else {
        panic!("expected limit, got {}", project.source.name());
    };
    assert_eq!(limit.id, "6");
    assert_eq!((limit.offset, limit.count), (5, 10));
    assert!(!limit.is_partial);
    assert!(matches!(limit.source.as_ref(), PlanNode::Values(_)));

    assert_eq!(count_kind(&physical, "RowNumberNode"), 0);
    assert_eq!(count_kind(&physical, "LocalPartitionNode"), 0);
}

#[test]
fn test_folded_shape_does_not_fold_again() {
    // What the fold leaves behind: the limit already carries the offset, and the
    // row number and filter stages are gone.
    let limit = LogicalPlanNode::Limit(LimitNode {
        id: "6".into(),
        source: Box::new(values("1", &["a"])),
        count: 10,
        step: LimitStep::Final,
    });
    let plan = identity("8", bigints(&["a"]), local_round_robin("7", limit));
    let LogicalPlanNode::Project(project) = &plan else {
        unreachable!();
    };

    let exprs = RowExpressionConverter;
    let converter = PlanConverter::new(&exprs, ConverterConfig::interactive());
    let task_id = task();
    let ctx = TranslationContext::new(&task_id);
    assert!(patterns::try_fold_offset_limit(&converter, project, &ctx)
        .unwrap()
        .is_none());

    let physical = assert_same_names(&plan);
    assert_eq!(count_kind(&physical, "LocalPartitionNode"), 1);
    let mut limits = Vec::new();
    physical.walk(&mut |n| {
        if let PlanNode::Limit(limit) = n {
            limits.push((limit.offset, limit.count));
        }
    });
    assert_eq!(limits, vec![(0, 10)]);
}

#[test]
fn test_offset_limit_mismatch_translates_literally() {
    // Project assigning the row number column breaks the pattern.
    let LogicalPlanNode::Project(mut project) = offset_limit_plan() else {
        unreachable!();
    };
    project.assignments.push(Assignment {
        variable: var("rn", "bigint"),
        expression: var("rn", "bigint").into(),
    });
    let physical = translate(&LogicalPlanNode::Project(project)).unwrap();
    assert_eq!(count_kind(&physical, "RowNumberNode"), 1);
    assert_eq!(count_kind(&physical, "FilterNode"), 1);
    assert_eq!(names(&physical), vec!["a", "rn"]);
}

// ---------------------------------------------------------------------------
// Local exchanges
// ---------------------------------------------------------------------------

#[test]
fn test_local_hash_exchange_renames_sources() {
    let layout = bigints(&["x"]);
    let node = LogicalPlanNode::Exchange(ExchangeNode {
        id: "5".into(),
        exchange_type: ExchangeType::Repartition,
        scope: ExchangeScope::Local,
        partitioning_scheme: scheme(
            SystemPartitioning::Fixed,
            SystemPartitionFunction::Hash,
            layout.clone(),
            vec![var("x", "bigint").into()],
        ),
        sources: vec![values("1", &["a"]), values("2", &["b"])],
        inputs: vec![bigints(&["a"]), bigints(&["b"])],
        ensure_source_ordering: false,
        ordering_scheme: None,
    });
    let physical = assert_same_names(&node);
    let PlanNode::LocalPartition(partition) = physical.as_ref() else {
        panic!("expected local partition");
    };
    assert_eq!(partition.partition_type, LocalPartitionType::Repartition);
    assert!(matches!(
        &partition.partition_function,
        PartitionFunctionSpec::Hash { key_channels, .. } if key_channels == &vec![0]
    ));
    let ids: Vec<&str> = partition.sources.iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec!["5.0", "5.1"]);
    for source in &partition.sources {
        assert_eq!(names(source), vec!["x"]);
    }
}

#[test]
fn test_local_gather_and_merge() {
    let gather = local_gather("3", values("1", &["a"]));
    let physical = assert_same_names(&gather);
    let PlanNode::LocalPartition(partition) = physical.as_ref() else {
        panic!("expected local partition");
    };
    assert_eq!(partition.partition_type, LocalPartitionType::Gather);

    let LogicalPlanNode::Exchange(mut merge) = local_gather("3", values("1", &["a"])) else {
        unreachable!();
    };
    merge.ordering_scheme = Some(OrderingScheme {
        order_by: vec![Ordering {
            variable: var("a", "bigint"),
            sort_order: SortOrder::AscNullsLast,
        }],
    });
    let physical = assert_same_names(&LogicalPlanNode::Exchange(merge));
    assert!(matches!(physical.as_ref(), PlanNode::LocalMerge(_)));
}

#[test]
fn test_unsupported_exchanges() {
    let LogicalPlanNode::Exchange(mut remote) = local_gather("3", values("1", &["a"])) else {
        unreachable!();
    };
    remote.scope = ExchangeScope::RemoteStreaming;
    assert!(matches!(
        translate(&LogicalPlanNode::Exchange(remote)),
        Err(ConvertError::Unsupported(_))
    ));

    let LogicalPlanNode::Exchange(mut replicate) = local_gather("3", values("1", &["a"])) else {
        unreachable!();
    };
    replicate.exchange_type = ExchangeType::Replicate;
    assert!(matches!(
        translate(&LogicalPlanNode::Exchange(replicate)),
        Err(ConvertError::Unsupported(_))
    ));
}
