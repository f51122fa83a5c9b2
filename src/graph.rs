/// Reactive graph and trigger pipeline
///
/// Reactions are computations that read some dataframes or stores and write
/// others. Each declares what it reads ([`Input`]) and what it writes
/// ([`Output`]); the [`ReactiveGraph`] orders reactions so that writers run
/// before their readers.
///
/// [`trigger`] drains the [`ModificationQueue`] and re-runs every reaction
/// whose inputs intersect the modifications seen so far, in topological
/// order. Each reaction runs at most once per trigger and sees the combined
/// effect of every modification queued before the trigger.
///
/// Mutation and triggering are not transactional: if a reaction fails, the
/// trigger stops and returns the error, and nothing already written is
/// rolled back.

use crate::error::{FrameError, Result};
use crate::frame::{DataFrame, FrameId};
use crate::modification::{Input, Modification, ModificationQueue};
use crate::store::{Store, StoreId};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

/// Every dataframe and store a session knows about, by id.
#[derive(Debug, Default)]
pub struct Workspace {
    frames: BTreeMap<FrameId, DataFrame>,
    stores: BTreeMap<StoreId, Store>,
}

impl Workspace {
    pub fn new() -> Self {
        Workspace::default()
    }

    pub fn insert_frame(&mut self, df: DataFrame) -> FrameId {
        let id = df.id();
        self.frames.insert(id, df);
        id
    }

    pub fn insert_store(&mut self, store: Store) -> StoreId {
        let id = store.id();
        self.stores.insert(id, store);
        id
    }

    pub fn frame(&self, id: FrameId) -> Result<&DataFrame> {
        self.frames
            .get(&id)
            .ok_or_else(|| FrameError::FrameNotFound(id.to_string()))
    }

    pub fn frame_mut(&mut self, id: FrameId) -> Result<&mut DataFrame> {
        self.frames
            .get_mut(&id)
            .ok_or_else(|| FrameError::FrameNotFound(id.to_string()))
    }

    pub fn store(&self, id: StoreId) -> Result<&Store> {
        self.stores
            .get(&id)
            .ok_or_else(|| FrameError::StoreNotFound(id.to_string()))
    }

    pub fn store_mut(&mut self, id: StoreId) -> Result<&mut Store> {
        self.stores
            .get_mut(&id)
            .ok_or_else(|| FrameError::StoreNotFound(id.to_string()))
    }
}

/// State a reaction writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Frame(FrameId),
    Store(StoreId),
}

impl Output {
    fn feeds(&self, input: &Input) -> bool {
        match (self, input) {
            (Output::Frame(a), Input::Frame { id, .. }) => a == id,
            (Output::Store(a), Input::Store(b)) => a == b,
            _ => false,
        }
    }
}

type ReactionFn = Box<dyn FnMut(&mut Workspace) -> Result<Vec<Modification>> + Send>;

/// A named computation over workspace state.
pub struct Reaction {
    name: String,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    body: ReactionFn,
}

impl Reaction {
    /// `body` returns the modifications it made to the workspace.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnMut(&mut Workspace) -> Result<Vec<Modification>> + Send + 'static,
    {
        Reaction {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            body: Box::new(body),
        }
    }

    pub fn reads(mut self, input: Input) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn writes(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_affected_by(&self, seen: &[Modification]) -> bool {
        self.inputs
            .iter()
            .any(|input| seen.iter().any(|m| m.touches(input)))
    }

    fn feeds(&self, other: &Reaction) -> bool {
        self.outputs
            .iter()
            .any(|out| other.inputs.iter().any(|input| out.feeds(input)))
    }
}

impl std::fmt::Debug for Reaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reaction")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}

/// Registry of reactions and the writer -> reader edges between them.
#[derive(Debug, Default)]
pub struct ReactiveGraph {
    reactions: Vec<Reaction>,
    edges: DiGraphMap<usize, ()>,
    /// Run order: topological, registration order among independent reactions
    order: Vec<usize>,
}

impl ReactiveGraph {
    pub fn new() -> Self {
        ReactiveGraph::default()
    }

    pub fn len(&self) -> usize {
        self.reactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty()
    }

    /// Reaction names in run order.
    pub fn run_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&i| self.reactions[i].name.as_str())
            .collect()
    }

    /// Add a reaction. Fails if its declared reads and writes would make
    /// two reactions depend on each other.
    ///
    /// A reaction that writes state it also reads does not depend on
    /// itself; it still runs at most once per trigger.
    pub fn register(&mut self, reaction: Reaction) -> Result<()> {
        let index = self.reactions.len();
        self.edges.add_node(index);
        for (i, existing) in self.reactions.iter().enumerate() {
            if existing.feeds(&reaction) {
                self.edges.add_edge(i, index, ());
            }
            if reaction.feeds(existing) {
                self.edges.add_edge(index, i, ());
            }
        }

        if petgraph::algo::is_cyclic_directed(&self.edges) {
            self.edges.remove_node(index);
            return Err(FrameError::CyclicGraph(reaction.name));
        }

        log::debug!("registered reaction '{}'", reaction.name);
        self.reactions.push(reaction);
        self.order = self.sorted();
        Ok(())
    }

    /// Kahn's algorithm, always picking the earliest registered ready
    /// reaction.
    fn sorted(&self) -> Vec<usize> {
        let mut in_degree: Vec<usize> = (0..self.reactions.len())
            .map(|n| self.edges.neighbors_directed(n, Direction::Incoming).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(n, _)| Reverse(n))
            .collect();

        let mut order = Vec::with_capacity(self.reactions.len());
        while let Some(Reverse(n)) = ready.pop() {
            order.push(n);
            for next in self.edges.neighbors_directed(n, Direction::Outgoing) {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }
        order
    }

    /// Drain `queue` and run every affected reaction. Returns the drained
    /// modifications followed by those the reactions produced, in order.
    pub fn trigger(
        &mut self,
        workspace: &mut Workspace,
        queue: &mut ModificationQueue,
    ) -> Result<Vec<Modification>> {
        let mut seen = queue.drain();
        log::debug!(
            "trigger (generation {}): {} queued modification(s)",
            queue.generation(),
            seen.len()
        );

        for &index in &self.order {
            let reaction = &mut self.reactions[index];
            if !reaction.is_affected_by(&seen) {
                continue;
            }
            log::debug!("running reaction '{}'", reaction.name);
            let produced = (reaction.body)(workspace).map_err(|e| FrameError::Reaction {
                name: reaction.name.clone(),
                message: e.to_string(),
            })?;
            seen.extend(produced);
        }
        Ok(seen)
    }
}

/// Drain `queue` and propagate the batch through `graph`.
pub fn trigger(
    graph: &mut ReactiveGraph,
    workspace: &mut Workspace,
    queue: &mut ModificationQueue,
) -> Result<Vec<Modification>> {
    graph.trigger(workspace, queue)
}

/// One interactive session: its state, pending modifications and reactions.
#[derive(Debug, Default)]
pub struct Session {
    pub workspace: Workspace,
    pub queue: ModificationQueue,
    pub graph: ReactiveGraph,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    pub fn trigger(&mut self) -> Result<Vec<Modification>> {
        self.graph.trigger(&mut self.workspace, &mut self.queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ScalarColumn;
    use crate::modification::{DataFrameModification, StoreModification};
    use crate::value::Value;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn scores() -> DataFrame {
        DataFrame::from_columns(vec![
            ("id", ScalarColumn::new(vec![1i64, 2, 3], None).unwrap()),
            ("score", ScalarColumn::new(vec![10i64, 20, 30], None).unwrap()),
            ("note", ScalarColumn::new(vec!["a", "b", "c"], None).unwrap()),
        ])
        .unwrap()
    }

    fn counting(name: &str, counter: &Arc<AtomicUsize>) -> Reaction {
        let counter = Arc::clone(counter);
        Reaction::new(name, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        })
    }

    #[test]
    fn test_only_affected_reactions_run() {
        let mut session = Session::new();
        let df = session.workspace.insert_frame(scores());

        let score_runs = Arc::new(AtomicUsize::new(0));
        let note_runs = Arc::new(AtomicUsize::new(0));
        session
            .graph
            .register(counting("on_score", &score_runs).reads(Input::columns(df, ["score"])))
            .unwrap();
        session
            .graph
            .register(counting("on_note", &note_runs).reads(Input::columns(df, ["note"])))
            .unwrap();

        let m = session
            .workspace
            .frame_mut(df)
            .unwrap()
            .edit(Value::Int(99), "score", &Value::Int(2), "id")
            .unwrap();
        session.queue.push(m.clone());
        // A second edit of the same column still runs the reaction once
        let m2 = session
            .workspace
            .frame_mut(df)
            .unwrap()
            .edit(Value::Int(98), "score", &Value::Int(3), "id")
            .unwrap();
        session.queue.push(m2);

        let out = session.trigger().unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Modification::DataFrame(m));
        assert_eq!(score_runs.load(Ordering::SeqCst), 1);
        assert_eq!(note_runs.load(Ordering::SeqCst), 0);
        assert!(session.queue.is_empty());
    }

    #[test]
    fn test_cascade_runs_in_dependency_order() {
        let mut session = Session::new();
        let source = session.workspace.insert_frame(scores());
        let totals = session.workspace.insert_frame(
            DataFrame::from_columns(vec![("total", ScalarColumn::new(vec![0i64], None).unwrap())])
                .unwrap(),
        );
        let summary = session.workspace.insert_store(Store::new(json!(null)));

        // Registered before its upstream on purpose
        let publish = Reaction::new("publish", move |ws: &mut Workspace| {
            let total = ws.frame(totals)?.column("total")?.sum()?;
            let m = ws.store_mut(summary)?.set(total.to_json());
            Ok(m.into_iter().map(Modification::from).collect())
        })
        .reads(Input::frame(totals))
        .writes(Output::Store(summary));

        let sum = Reaction::new("sum_scores", move |ws: &mut Workspace| {
            let total = ws.frame(source)?.column("score")?.sum()?;
            let column = ScalarColumn::new(vec![total], None)?;
            Ok(vec![ws.frame_mut(totals)?.set_column("total", column)?.into()])
        })
        .reads(Input::columns(source, ["score"]))
        .writes(Output::Frame(totals));

        session.graph.register(publish).unwrap();
        session.graph.register(sum).unwrap();
        assert_eq!(session.graph.run_order(), vec!["sum_scores", "publish"]);

        let m = session
            .workspace
            .frame_mut(source)
            .unwrap()
            .edit(Value::Int(50), "score", &Value::Int(1), "id")
            .unwrap();
        session.queue.push(m);

        let out = session.trigger().unwrap();
        assert_eq!(
            out,
            vec![
                Modification::from(DataFrameModification::new(source, ["score"])),
                Modification::from(DataFrameModification::new(totals, ["total"])),
                Modification::from(StoreModification { id: summary }),
            ]
        );
        assert_eq!(*session.workspace.store(summary).unwrap().get(), json!(100));
    }

    #[test]
    fn test_cycles_are_rejected() {
        let a = FrameId::next();
        let b = FrameId::next();
        let mut graph = ReactiveGraph::new();
        graph
            .register(Reaction::new("a_to_b", |_| Ok(Vec::new())).reads(Input::frame(a)).writes(Output::Frame(b)))
            .unwrap();
        let err = graph
            .register(Reaction::new("b_to_a", |_| Ok(Vec::new())).reads(Input::frame(b)).writes(Output::Frame(a)))
            .unwrap_err();
        assert_eq!(err, FrameError::CyclicGraph("b_to_a".to_string()));
        assert_eq!(graph.len(), 1);

        // Reading and writing the same frame is not a cycle
        graph
            .register(Reaction::new("derive", |_| Ok(Vec::new())).reads(Input::frame(a)).writes(Output::Frame(a)))
            .unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_failing_reaction_does_not_roll_back() {
        let mut session = Session::new();
        let df = session.workspace.insert_frame(scores());
        session
            .graph
            .register(
                Reaction::new("broken", move |ws: &mut Workspace| {
                    ws.frame(df)?.column("missing")?;
                    Ok(Vec::new())
                })
                .reads(Input::frame(df)),
            )
            .unwrap();

        let m = session
            .workspace
            .frame_mut(df)
            .unwrap()
            .edit(Value::Int(7), "score", &Value::Int(1), "id")
            .unwrap();
        session.queue.push(m);

        let err = session.trigger().unwrap_err();
        assert!(matches!(err, FrameError::Reaction { ref name, .. } if name == "broken"));
        assert_eq!(
            *session.workspace.frame(df).unwrap().column("score").unwrap().get(0).unwrap(),
            Value::Int(7)
        );
        assert!(session.queue.is_empty());
    }

    #[test]
    fn test_empty_trigger() {
        let mut session = Session::new();
        assert!(session.trigger().unwrap().is_empty());
        assert_eq!(session.queue.generation(), 1);
    }
}
