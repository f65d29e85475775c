use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use strata::buffer::BufferPoolManager;
use strata::catalog::Catalog;
use strata::common::Transaction;
use strata::execution::{
    create_executor, ComparisonOp, Executor, ExecutorContext, Expression, JoinType, OrderBy,
    PlanNode,
};
use strata::optimizer::optimize_sort_limit_as_topn;
use strata::storage::disk::DiskManager;
use strata::tuple::{DataType, Schema, Tuple, Value};

fn setup() -> (Arc<ExecutorContext>, TempDir) {
    let dir = TempDir::new().unwrap();
    let dm = Arc::new(DiskManager::new(dir.path().join("exec.db")).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(128, 2, dm));
    let catalog = Arc::new(Catalog::new(Arc::clone(&bpm)));
    let ctx = Arc::new(ExecutorContext::new(
        catalog,
        bpm,
        Arc::new(Transaction::new()),
    ));
    (ctx, dir)
}

fn run(ctx: &Arc<ExecutorContext>, plan: &PlanNode) -> Vec<Tuple> {
    let mut exec = create_executor(ctx, plan).unwrap();
    exec.init().unwrap();
    let mut rows = Vec::new();
    while let Some((tuple, _)) = exec.next().unwrap() {
        rows.push(tuple);
    }
    rows
}

fn int_rows(values: &[i32]) -> PlanNode {
    PlanNode::Values {
        schema: Schema::builder().column("x", DataType::Integer).build_arc(),
        rows: values.iter().map(|&v| vec![Value::Integer(v)]).collect(),
    }
}

fn seed_users(ctx: &Arc<ExecutorContext>) -> (u32, u32) {
    let schema = Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::VarChar(32))
        .build();
    let table = ctx.catalog.create_table("users", schema).unwrap();
    let index = ctx.catalog.create_index("users_id", "users", vec![0]).unwrap();

    let insert = PlanNode::Insert {
        table_oid: table.oid,
        child: Box::new(PlanNode::Values {
            schema: Arc::clone(&table.schema),
            rows: vec![
                vec![Value::Integer(3), Value::from("carol")],
                vec![Value::Integer(1), Value::from("alice")],
                vec![Value::Integer(5), Value::from("eve")],
                vec![Value::Integer(2), Value::from("bob")],
                vec![Value::Integer(4), Value::from("dave")],
            ],
        }),
    };
    let counts = run(ctx, &insert);
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].value(0), Some(&Value::Integer(5)));

    (table.oid, index.oid)
}

#[test]
fn insert_reports_count_then_eof() {
    let (ctx, _dir) = setup();
    let (table_oid, _) = seed_users(&ctx);

    let insert = PlanNode::Insert {
        table_oid,
        child: Box::new(PlanNode::Values {
            schema: ctx.catalog.get_table(table_oid).unwrap().schema.clone(),
            rows: vec![vec![Value::Integer(9), Value::from("zed")]],
        }),
    };
    let mut exec = create_executor(&ctx, &insert).unwrap();
    exec.init().unwrap();
    assert!(exec.next().unwrap().is_some());
    assert!(exec.next().unwrap().is_none(), "count row must be final");
}

#[test]
fn seq_scan_returns_insertion_order() {
    let (ctx, _dir) = setup();
    let (table_oid, _) = seed_users(&ctx);

    let rows = run(&ctx, &PlanNode::SeqScan { table_oid });
    let ids: Vec<i32> = rows
        .iter()
        .map(|t| match t.value(0).unwrap() {
            Value::Integer(v) => *v,
            other => panic!("unexpected value {:?}", other),
        })
        .collect();
    assert_eq!(ids, vec![3, 1, 5, 2, 4]);
}

#[test]
fn index_scan_returns_key_order() {
    let (ctx, _dir) = setup();
    let (_, index_oid) = seed_users(&ctx);

    let rows = run(&ctx, &PlanNode::IndexScan { index_oid });
    let ids: Vec<i32> = rows
        .iter()
        .map(|t| match t.value(0).unwrap() {
            Value::Integer(v) => *v,
            other => panic!("unexpected value {:?}", other),
        })
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[test]
fn delete_maintains_indexes() {
    let (ctx, _dir) = setup();
    let (table_oid, index_oid) = seed_users(&ctx);

    let delete = PlanNode::Delete {
        table_oid,
        child: Box::new(PlanNode::SeqScan { table_oid }),
    };
    let counts = run(&ctx, &delete);
    assert_eq!(counts[0].value(0), Some(&Value::Integer(5)));

    assert!(run(&ctx, &PlanNode::SeqScan { table_oid }).is_empty());
    assert!(run(&ctx, &PlanNode::IndexScan { index_oid }).is_empty());

    let index = ctx.catalog.get_index(index_oid).unwrap();
    for key in 1..=5u32 {
        assert_eq!(index.index.get_value(key).unwrap(), None);
    }
}

#[test]
fn left_nested_loop_join_pads_unmatched_rows() {
    // L = [(1), (2)], R = [(2,'a'), (2,'b')], LEFT join on L.x = R.x.
    // Expected output, in order: (1, NULL, NULL), (2, 2, 'a'), (2, 2, 'b').
    let (ctx, _dir) = setup();

    let left = int_rows(&[1, 2]);
    let right = PlanNode::Values {
        schema: Schema::builder()
            .column("x", DataType::Integer)
            .column("tag", DataType::VarChar(8))
            .build_arc(),
        rows: vec![
            vec![Value::Integer(2), Value::from("a")],
            vec![Value::Integer(2), Value::from("b")],
        ],
    };
    let join = PlanNode::NestedLoopJoin {
        join_type: JoinType::Left,
        predicate: Expression::comparison(
            ComparisonOp::Eq,
            Expression::join_column(0, 0),
            Expression::join_column(1, 0),
        ),
        left: Box::new(left),
        right: Box::new(right),
    };

    let rows = run(&ctx, &join);
    let as_values: Vec<Vec<Value>> = rows.iter().map(|t| t.values().to_vec()).collect();
    assert_eq!(
        as_values,
        vec![
            vec![Value::Integer(1), Value::Null, Value::Null],
            vec![Value::Integer(2), Value::Integer(2), Value::from("a")],
            vec![Value::Integer(2), Value::Integer(2), Value::from("b")],
        ]
    );
}

#[test]
fn inner_nested_loop_join_drops_unmatched_rows() {
    let (ctx, _dir) = setup();

    let join = PlanNode::NestedLoopJoin {
        join_type: JoinType::Inner,
        predicate: Expression::comparison(
            ComparisonOp::Eq,
            Expression::join_column(0, 0),
            Expression::join_column(1, 0),
        ),
        left: Box::new(int_rows(&[1, 2, 3])),
        right: Box::new(int_rows(&[2, 3, 4])),
    };

    let rows = run(&ctx, &join);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].values(), &[Value::Integer(2), Value::Integer(2)]);
    assert_eq!(rows[1].values(), &[Value::Integer(3), Value::Integer(3)]);
}

#[test]
fn unsupported_join_types_fail_at_construction() {
    let (ctx, _dir) = setup();

    for join_type in [JoinType::Right, JoinType::Full] {
        let join = PlanNode::NestedLoopJoin {
            join_type,
            predicate: Expression::constant(true),
            left: Box::new(int_rows(&[1])),
            right: Box::new(int_rows(&[1])),
        };
        assert!(create_executor(&ctx, &join).is_err());
    }
}

#[test]
fn nested_index_join_probes_inner_index() {
    let (ctx, _dir) = setup();
    let (_, index_oid) = seed_users(&ctx);

    // Outer rows reference user ids; 7 matches nobody.
    let outer = int_rows(&[2, 7, 4]);

    let inner_join = PlanNode::NestedIndexJoin {
        join_type: JoinType::Inner,
        key_expr: Expression::column(0),
        index_oid,
        child: Box::new(outer.clone()),
    };
    let rows = run(&ctx, &inner_join);
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0].values(),
        &[Value::Integer(2), Value::Integer(2), Value::from("bob")]
    );
    assert_eq!(
        rows[1].values(),
        &[Value::Integer(4), Value::Integer(4), Value::from("dave")]
    );

    let left_join = PlanNode::NestedIndexJoin {
        join_type: JoinType::Left,
        key_expr: Expression::column(0),
        index_oid,
        child: Box::new(outer),
    };
    let rows = run(&ctx, &left_join);
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[1].values(),
        &[Value::Integer(7), Value::Null, Value::Null]
    );
}

#[test]
fn sort_limit_rewrites_to_topn_with_identical_output() {
    // Limit(3, Sort(desc x)) over [5,1,4,2,3] must yield [5,4,3] both as
    // written and after the TopN rewrite.
    let (ctx, _dir) = setup();

    let plan = PlanNode::Limit {
        limit: 3,
        child: Box::new(PlanNode::Sort {
            order_bys: vec![OrderBy::desc(Expression::column(0))],
            child: Box::new(int_rows(&[5, 1, 4, 2, 3])),
        }),
    };

    let optimized = optimize_sort_limit_as_topn(plan.clone());
    assert!(matches!(optimized, PlanNode::TopN { .. }));

    let expected = vec![
        vec![Value::Integer(5)],
        vec![Value::Integer(4)],
        vec![Value::Integer(3)],
    ];
    let plain: Vec<Vec<Value>> = run(&ctx, &plan).iter().map(|t| t.values().to_vec()).collect();
    let rewritten: Vec<Vec<Value>> = run(&ctx, &optimized)
        .iter()
        .map(|t| t.values().to_vec())
        .collect();
    assert_eq!(plain, expected);
    assert_eq!(rewritten, expected);
}

#[test]
fn topn_rewrite_is_equivalent_on_random_inputs() {
    let (ctx, _dir) = setup();
    let mut rng = StdRng::seed_from_u64(0x70b);

    for trial in 0..20 {
        let values: Vec<i32> = (0..rng.gen_range(0..40)).map(|_| rng.gen_range(-50..50)).collect();
        let desc = rng.gen_bool(0.5);
        let limit = rng.gen_range(0..10);

        let plan = PlanNode::Limit {
            limit,
            child: Box::new(PlanNode::Sort {
                order_bys: vec![OrderBy {
                    expr: Expression::column(0),
                    desc,
                }],
                child: Box::new(int_rows(&values)),
            }),
        };
        let optimized = optimize_sort_limit_as_topn(plan.clone());

        let plain: Vec<Vec<Value>> =
            run(&ctx, &plan).iter().map(|t| t.values().to_vec()).collect();
        let rewritten: Vec<Vec<Value>> = run(&ctx, &optimized)
            .iter()
            .map(|t| t.values().to_vec())
            .collect();
        assert_eq!(plain, rewritten, "trial {} diverged", trial);
    }
}
