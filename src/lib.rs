/// LiveFrame - Interactive Dataframes over Pluggable Column Backends
///
/// Scalar columns share one API over two storage backends (pandas-like and
/// arrow-like), dataframes are ordered collections of those columns, and every
/// mutation yields a modification record. Modifications queue up until a
/// trigger runs the reactions that read the changed state.

pub mod error;
pub mod value;
pub mod sequence;
pub mod kernels;
pub mod backend;
pub mod column;
pub mod frame;
pub mod modification;
pub mod store;
pub mod graph;
pub mod endpoints;
pub mod config;

pub use error::{ErrorKind, FallbackWarning, FrameError, Result, Warned};
pub use value::{DType, Value};
pub use sequence::{ArraySequence, ChunkedSequence, Sequence};
pub use kernels::{ArithOp, CompareOp, LogicalOp};
pub use backend::{ArrowBackend, BackendData, BackendKind, ColumnBackend, PandasBackend};
pub use column::{ColumnSource, Operand, ScalarColumn};
pub use frame::{DataFrame, FrameId, RowSelection};
pub use modification::{DataFrameModification, Input, Modification, ModificationQueue, StoreModification};
pub use store::{Store, StoreId};
pub use graph::{trigger, Output, Reaction, ReactiveGraph, Session, Workspace};
pub use endpoints::{
    ColumnInfo, EditRequest, RemoveRowRequest, RowsRequest, RowsResponse, SchemaRequest, SchemaResponse,
};
pub use config::ServerConfig;

// HTTP server - only when server feature is enabled
#[cfg(feature = "server")]
pub mod server;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::collections::BTreeSet;

    fn scores(backend: &str) -> DataFrame {
        DataFrame::from_columns(vec![
            ("id", ScalarColumn::new(vec![1i64, 2, 3], Some(backend)).unwrap()),
            ("score", ScalarColumn::new(vec![10i64, 20, 30], Some(backend)).unwrap()),
        ])
        .unwrap()
    }

    fn scope(modification: &Modification) -> Vec<&str> {
        match modification {
            Modification::DataFrame(m) => m.scope.iter().map(String::as_str).collect(),
            other => panic!("expected a dataframe modification, got {:?}", other),
        }
    }

    #[test]
    fn test_edit_then_trigger() {
        let mut session = Session::new();
        let id = session.workspace.insert_frame(scores("pandas"));

        let request = EditRequest {
            value: Value::Int(99),
            column: "score".to_string(),
            row_id: Value::Int(2),
            id_column: "id".to_string(),
        };
        let Session { workspace, queue, .. } = &mut session;
        endpoints::edit(workspace.frame_mut(id).unwrap(), queue, &request).unwrap();
        assert_eq!(session.queue.len(), 1);

        let modifications = session.trigger().unwrap();
        assert_eq!(modifications.len(), 1);
        assert_eq!(scope(&modifications[0]), vec!["score"]);
        assert!(session.queue.is_empty());

        let df = session.workspace.frame(id).unwrap();
        let expected = ScalarColumn::new(vec![10i64, 99, 30], None).unwrap();
        assert!(df.column("score").unwrap().equals(&expected));
    }

    #[test]
    fn test_remove_row_then_trigger() {
        for backend in ["pandas", "arrow"] {
            let mut session = Session::new();
            let id = session.workspace.insert_frame(scores(backend));

            let Session { workspace, queue, .. } = &mut session;
            endpoints::remove_row_by_index(
                workspace.frame_mut(id).unwrap(),
                queue,
                &RemoveRowRequest { row_index: 1 },
            )
            .unwrap();

            let modifications = session.trigger().unwrap();
            assert_eq!(scope(&modifications[0]), vec!["id", "score"]);

            let df = session.workspace.frame(id).unwrap();
            let rows: Vec<Vec<Value>> = df
                .iter_rows()
                .map(|row| row.into_iter().cloned().collect())
                .collect();
            assert_eq!(
                rows,
                vec![
                    vec![Value::Int(1), Value::Int(10)],
                    vec![Value::Int(3), Value::Int(30)],
                ]
            );
        }
    }

    #[test]
    fn test_reaction_cascade_through_trigger() {
        let mut session = Session::new();
        let source = session.workspace.insert_frame(scores("pandas"));
        let summary = session.workspace.insert_frame(DataFrame::new());
        let total = session.workspace.insert_store(Store::new(serde_json::json!(null)));

        // source.score -> summary.doubled -> total
        session
            .graph
            .register(
                Reaction::new("total", move |ws: &mut Workspace| {
                    let sum = ws.frame(summary)?.column("doubled")?.sum()?;
                    let changed = ws.store_mut(total)?.set(sum.to_json());
                    Ok(changed.into_iter().map(Modification::from).collect())
                })
                .reads(Input::columns(summary, ["doubled"]))
                .writes(Output::Store(total)),
            )
            .unwrap();
        session
            .graph
            .register(
                Reaction::new("double", move |ws: &mut Workspace| {
                    let doubled = (ws.frame(source)?.column("score")? * 2i64)?;
                    let modification = ws.frame_mut(summary)?.set_column("doubled", doubled)?;
                    Ok(vec![modification.into()])
                })
                .reads(Input::columns(source, ["score"]))
                .writes(Output::Frame(summary)),
            )
            .unwrap();
        assert_eq!(session.graph.run_order(), vec!["double", "total"]);

        let Session { workspace, queue, .. } = &mut session;
        let edit = workspace
            .frame_mut(source)
            .unwrap()
            .edit(Value::Int(50), "score", &Value::Int(3), "id")
            .unwrap();
        queue.push(edit);

        let modifications = session.trigger().unwrap();
        assert_eq!(modifications.len(), 3);
        assert!(matches!(modifications[2], Modification::Store(_)));
        assert_eq!(
            *session.workspace.store(total).unwrap().get(),
            serde_json::json!(160)
        );
    }

    #[test]
    fn test_backends_compute_alike() {
        let values = vec![4.0, 1.5, -2.0, 8.0, 0.5];
        let pandas = ScalarColumn::new(values.clone(), Some("pandas")).unwrap();
        let arrow = ScalarColumn::new(values, Some("arrow")).unwrap();

        assert_eq!(pandas.sum().unwrap(), arrow.sum().unwrap());
        assert_eq!(pandas.mean().unwrap(), arrow.mean().unwrap());
        assert_eq!(pandas.max().unwrap(), arrow.max().unwrap());

        let pm = pandas.median().unwrap();
        let am = arrow.median().unwrap();
        assert_eq!(pm.value(), am.value());
        assert!(!pm.has_warnings());
        assert!(am.has_warnings());

        // Equality needs the same backend
        assert!(!pandas.equals(&arrow));
        assert!(pandas.equals(&arrow.to_backend(BackendKind::Pandas)));

        let mask = (&pandas + &pandas).unwrap().gt(2i64).unwrap();
        let picked = arrow.filter(&mask.to_backend(BackendKind::Arrow)).unwrap();
        assert_eq!(picked.to_vec(), vec![Value::Float(4.0), Value::Float(1.5), Value::Float(8.0)]);
    }

    #[test]
    fn test_rows_endpoint_over_json_frame() {
        let df = DataFrame::from_json_records(
            r#"[{"name": "ann", "age": 31}, {"name": "bob", "age": 45}, {"name": "cy", "age": 27}]"#,
            Some("arrow"),
        )
        .unwrap()
        .with_primary_key("name")
        .unwrap();

        let request = RowsRequest {
            keyidxs: Some(vec![Value::from("cy"), Value::from("ann")]),
            columns: Some(vec!["age".to_string()]),
            ..RowsRequest::default()
        };
        let response = endpoints::rows(&df, &request).unwrap();
        assert_eq!(
            response.rows,
            vec![
                vec![serde_json::json!(27), serde_json::json!("cy")],
                vec![serde_json::json!(31), serde_json::json!("ann")],
            ]
        );

        let names: BTreeSet<&str> = response.column_infos.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, BTreeSet::from(["age", "name"]));
    }
}
