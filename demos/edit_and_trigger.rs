/// Edit and Trigger Example
///
/// This example demonstrates:
/// - Building a dataframe from JSON records
/// - Column arithmetic and aggregations on both backends
/// - Registering a reaction that keeps a summary store current
/// - Editing a row and running the trigger

use liveframe::{
    BackendKind, DataFrame, Input, Modification, Output, Reaction, Result, Session, Store, Value,
    Workspace,
};

fn main() -> Result<()> {
    println!("=== LiveFrame Edit and Trigger Example ===\n");

    // 1. Load a frame
    println!("1. Loading sales...");
    let sales = DataFrame::from_json_records(
        r#"[
            {"id": 1, "product": "Widget", "quantity": 10, "price": 9.99},
            {"id": 2, "product": "Gadget", "quantity": 5, "price": 19.99},
            {"id": 3, "product": "Doohickey", "quantity": 20, "price": 4.99}
        ]"#,
        Some("arrow"),
    )?
    .with_primary_key("id")?;
    println!("   {:?}\n", sales);

    // 2. Column operations
    println!("2. Computing revenue...");
    let revenue = (sales.column("quantity")? * sales.column("price")?)?;
    println!("   revenue: {:?}", revenue.to_vec());
    println!("   total:   {}", revenue.sum()?);
    let median = revenue.median()?;
    for warning in median.warnings() {
        println!("   note:    {}", warning);
    }
    println!("   median:  {}", median.value());
    let pandas = revenue.to_backend(BackendKind::Pandas);
    println!("   pandas median: {} (no fallback)\n", pandas.median()?.value());

    // 3. Wire a reaction
    println!("3. Registering reaction...");
    let mut session = Session::new();
    let id = session.workspace.insert_frame(sales);
    let total = session.workspace.insert_store(Store::new(serde_json::Value::Null));
    session.graph.register(
        Reaction::new("total_quantity", move |ws: &mut Workspace| {
            let sum = ws.frame(id)?.column("quantity")?.sum()?;
            let changed = ws.store_mut(total)?.set(sum.to_json());
            Ok(changed.into_iter().map(Modification::from).collect())
        })
        .reads(Input::columns(id, ["quantity"]))
        .writes(Output::Store(total)),
    )?;
    println!("   run order: {:?}\n", session.graph.run_order());

    // 4. Edit and trigger
    println!("4. Editing quantity of id 2...");
    let modification = session
        .workspace
        .frame_mut(id)?
        .edit(Value::Int(15), "quantity", &Value::Int(2), "id")?;
    session.queue.push(modification);
    for modification in session.trigger()? {
        println!("   {}", serde_json::to_string(&modification).unwrap_or_default());
    }
    println!("   total quantity: {}\n", session.workspace.store(total)?.get());

    // 5. Remove a row
    println!("5. Removing row 0...");
    let modification = session.workspace.frame_mut(id)?.remove_row(0)?;
    session.queue.push(modification);
    session.trigger()?;
    println!("   {:?}", session.workspace.frame(id)?);
    println!("   total quantity: {}", session.workspace.store(total)?.get());

    println!("\n=== Example Complete ===");
    Ok(())
}
