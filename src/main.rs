use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use strata::buffer::BufferPoolManager;
use strata::catalog::Catalog;
use strata::common::Transaction;
use strata::execution::{
    create_executor, Executor, ExecutorContext, Expression, OrderBy, PlanNode,
};
use strata::optimizer::optimize_sort_limit_as_topn;
use strata::storage::disk::DiskManager;
use strata::tuple::{DataType, Schema, Value};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Strata - a teaching relational database core");
    println!("============================================\n");

    let db_path = "demo.db";
    let disk = Arc::new(DiskManager::new(db_path).expect("failed to open database file"));
    let bpm = Arc::new(BufferPoolManager::new(64, 2, disk));
    let catalog = Arc::new(Catalog::new(Arc::clone(&bpm)));

    let schema = Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::VarChar(32))
        .build();
    let table = catalog
        .create_table("users", schema)
        .expect("failed to create table");
    catalog
        .create_index("users_id_idx", "users", vec![0])
        .expect("failed to create index");
    println!("Created table 'users' with an index on id");

    let ctx = Arc::new(ExecutorContext::new(
        Arc::clone(&catalog),
        Arc::clone(&bpm),
        Arc::new(Transaction::new()),
    ));

    // INSERT INTO users VALUES (3, 'carol'), (1, 'alice'), (2, 'bob')
    let insert_plan = PlanNode::Insert {
        table_oid: table.oid,
        child: Box::new(PlanNode::Values {
            schema: Arc::clone(&table.schema),
            rows: vec![
                vec![Value::Integer(3), Value::from("carol")],
                vec![Value::Integer(1), Value::from("alice")],
                vec![Value::Integer(2), Value::from("bob")],
            ],
        }),
    };
    let mut insert = create_executor(&ctx, &insert_plan).expect("plan failed");
    insert.init().expect("init failed");
    if let Some((row, _)) = insert.next().expect("insert failed") {
        println!("Inserted {} rows", row.value(0).unwrap());
    }

    // SELECT * FROM users ORDER BY id DESC LIMIT 2, rewritten to TopN.
    let query = PlanNode::Limit {
        limit: 2,
        child: Box::new(PlanNode::Sort {
            order_bys: vec![OrderBy::desc(Expression::column(0))],
            child: Box::new(PlanNode::SeqScan {
                table_oid: table.oid,
            }),
        }),
    };
    let query = optimize_sort_limit_as_topn(query);

    let mut exec = create_executor(&ctx, &query).expect("plan failed");
    exec.init().expect("init failed");
    println!("\nTop 2 users by id (descending):");
    while let Some((row, _)) = exec.next().expect("scan failed") {
        println!("  id={} name={}", row.value(0).unwrap(), row.value(1).unwrap());
    }

    bpm.flush_all_pages().expect("flush failed");
    std::fs::remove_file(db_path).ok();
    println!("\nDone.");
}
