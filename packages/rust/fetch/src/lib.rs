//! Fan-out/join materialization of fragment sources into one [`Program`].
//!
//! Inline fragments are placed at enumeration time. Every remote fragment is
//! registered on a [`PendingJoin`] before any fetch starts; fetches are then
//! dispatched together and their completions are consumed by a single join
//! loop, so the latch needs no lock. The join fires exactly once, either from
//! the last arrival or, when nothing was remote, straight out of dispatch.

mod latch;

use std::time::Instant;

use reqwest::Client;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

use relaybuild_shared::{
    CompileConfig, FetchFailurePolicy, Fragment, FragmentOrder, FragmentSource, Program,
    RelayError, Result,
};

pub use latch::PendingJoin;

/// User-Agent string for fragment requests.
const USER_AGENT: &str = concat!("relaybuild/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// FetchCoordinator
// ---------------------------------------------------------------------------

/// Materializes mixed inline/remote fragment lists.
#[derive(Debug, Clone)]
pub struct FetchCoordinator {
    client: Client,
    order: FragmentOrder,
    on_error: FetchFailurePolicy,
}

impl FetchCoordinator {
    /// Create a coordinator. Fragment fetches carry no timeout.
    pub fn new(order: FragmentOrder, on_error: FetchFailurePolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| RelayError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            order,
            on_error,
        })
    }

    pub fn from_config(config: &CompileConfig) -> Result<Self> {
        Self::new(config.order, config.on_fetch_error)
    }

    /// Place inline fragments, register and start every remote fetch.
    ///
    /// Returns [`Aggregation::Ready`] without awaiting anything when no source
    /// is remote. Must run inside a Tokio runtime when any source is remote.
    pub fn dispatch(&self, sources: Vec<FragmentSource>) -> Aggregation {
        let mut state = JoinState::new(self.order, self.on_error, sources.len());
        let mut queue: Vec<(usize, String, Url)> = Vec::new();

        for (slot, source) in sources.into_iter().enumerate() {
            match source {
                FragmentSource::Inline { name, content, .. } => {
                    state.place_inline(slot, Fragment { name, content });
                }
                FragmentSource::Remote { name, location, .. } => {
                    state.join.register();
                    state.reserve(slot);
                    queue.push((slot, name, location));
                }
            }
        }

        // The queue is complete; nothing has been started before this point.
        info!(remote = queue.len(), order = ?self.order, "dispatching fragment fetches");
        let mut tasks = JoinSet::new();
        for (slot, name, location) in queue {
            let client = self.client.clone();
            tasks.spawn(async move {
                let outcome = fetch_fragment(&client, &location).await;
                Completion {
                    slot,
                    name,
                    location,
                    outcome,
                }
            });
        }

        if state.join.fire_if_ready() {
            debug!("no remote fragments, join fired during dispatch");
            return Aggregation::Ready(state.finish());
        }

        Aggregation::Pending(InFlight {
            tasks,
            state,
            started: Instant::now(),
        })
    }

    /// Dispatch and wait for the join.
    #[instrument(skip_all, fields(sources = sources.len()))]
    pub async fn gather(&self, sources: Vec<FragmentSource>) -> Result<Program> {
        self.dispatch(sources).join().await
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Outcome of [`FetchCoordinator::dispatch`].
#[derive(Debug)]
pub enum Aggregation {
    /// The join already fired; nothing was remote.
    Ready(Result<Program>),
    /// Remote fetches are in flight.
    Pending(InFlight),
}

impl Aggregation {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Resolve to the completed program.
    pub async fn join(self) -> Result<Program> {
        match self {
            Self::Ready(result) => result,
            Self::Pending(in_flight) => in_flight.join().await,
        }
    }
}

/// Remote fetches in flight for one aggregation attempt.
#[derive(Debug)]
pub struct InFlight {
    tasks: JoinSet<Completion>,
    state: JoinState,
    started: Instant,
}

impl InFlight {
    pub fn outstanding(&self) -> usize {
        self.state.join.outstanding()
    }

    /// Consume completions until the join fires.
    pub async fn join(mut self) -> Result<Program> {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(completion) => self.state.complete(completion),
                Err(e) => {
                    warn!(error = %e, "fragment fetch task did not finish");
                    self.state.task_failure.get_or_insert(e.to_string());
                }
            }

            if self.state.join.arrive() {
                debug!(
                    elapsed_ms = self.started.elapsed().as_millis(),
                    "all fragment fetches arrived"
                );
                return self.state.finish();
            }
            debug!(outstanding = self.state.join.outstanding(), "fragment arrived");
        }

        Err(RelayError::validation(format!(
            "fetch join drained with {} fragments outstanding",
            self.state.join.outstanding()
        )))
    }
}

// ---------------------------------------------------------------------------
// Join state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Completion {
    slot: usize,
    name: String,
    location: Url,
    outcome: std::result::Result<String, FetchFailure>,
}

#[derive(Debug)]
struct FetchFailure {
    message: String,
    /// Body obtained despite the failure, if any.
    partial: String,
}

impl FetchFailure {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            partial: String::new(),
        }
    }
}

#[derive(Debug)]
enum Assembly {
    /// One slot per discovered fragment.
    Slots(Vec<Option<Fragment>>),
    /// Appended as materialized.
    Appended(Vec<Fragment>),
}

#[derive(Debug)]
struct JoinState {
    join: PendingJoin,
    assembly: Assembly,
    on_error: FetchFailurePolicy,
    first_failure: Option<(Url, String)>,
    task_failure: Option<String>,
}

impl JoinState {
    fn new(order: FragmentOrder, on_error: FetchFailurePolicy, capacity: usize) -> Self {
        let assembly = match order {
            FragmentOrder::Discovery => Assembly::Slots(Vec::with_capacity(capacity)),
            FragmentOrder::Completion => Assembly::Appended(Vec::with_capacity(capacity)),
        };
        Self {
            join: PendingJoin::new(),
            assembly,
            on_error,
            first_failure: None,
            task_failure: None,
        }
    }

    fn place_inline(&mut self, slot: usize, fragment: Fragment) {
        match &mut self.assembly {
            Assembly::Slots(slots) => {
                debug_assert_eq!(slots.len(), slot);
                slots.push(Some(fragment));
            }
            Assembly::Appended(files) => files.push(fragment),
        }
    }

    fn reserve(&mut self, slot: usize) {
        if let Assembly::Slots(slots) = &mut self.assembly {
            debug_assert_eq!(slots.len(), slot);
            slots.push(None);
        }
    }

    fn complete(&mut self, completion: Completion) {
        let Completion {
            slot,
            name,
            location,
            outcome,
        } = completion;

        let content = match outcome {
            Ok(content) => content,
            Err(failure) => {
                warn!(%location, error = %failure.message, policy = ?self.on_error, "fragment fetch failed");
                if self.on_error == FetchFailurePolicy::Abort && self.first_failure.is_none() {
                    self.first_failure = Some((location, failure.message));
                }
                failure.partial
            }
        };

        let fragment = Fragment { name, content };
        match &mut self.assembly {
            Assembly::Slots(slots) => slots[slot] = Some(fragment),
            Assembly::Appended(files) => files.push(fragment),
        }
    }

    fn finish(self) -> Result<Program> {
        if let Some(message) = self.task_failure {
            return Err(RelayError::validation(format!(
                "fragment fetch task failed: {message}"
            )));
        }
        if let Some((location, message)) = self.first_failure {
            return Err(RelayError::FetchFailed {
                location: location.to_string(),
                message,
            });
        }

        let files = match self.assembly {
            Assembly::Slots(slots) => slots.into_iter().flatten().collect(),
            Assembly::Appended(files) => files,
        };
        Ok(Program { files })
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

async fn fetch_fragment(
    client: &Client,
    location: &Url,
) -> std::result::Result<String, FetchFailure> {
    if location.scheme() == "file" {
        let path = location
            .to_file_path()
            .map_err(|()| FetchFailure::new("not a local file URL"))?;
        return tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| FetchFailure::new(e.to_string()));
    }

    let response = client
        .get(location.clone())
        .send()
        .await
        .map_err(|e| FetchFailure::new(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| FetchFailure::new(format!("failed to read body: {e}")))?;

    if !status.is_success() {
        return Err(FetchFailure {
            message: format!("HTTP {status}"),
            partial: body,
        });
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use relaybuild_shared::FragmentKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn inline(name: &str, content: &str) -> FragmentSource {
        FragmentSource::Inline {
            kind: FragmentKind::Source,
            name: name.into(),
            content: content.into(),
        }
    }

    fn remote(server: &MockServer, name: &str) -> FragmentSource {
        FragmentSource::Remote {
            kind: FragmentKind::Source,
            name: name.into(),
            location: Url::parse(&format!("{}/{name}", server.uri())).unwrap(),
        }
    }

    async fn serve(server: &MockServer, name: &str, body: &str, delay_ms: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/{name}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .set_delay(Duration::from_millis(delay_ms)),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    fn coordinator(order: FragmentOrder, on_error: FetchFailurePolicy) -> FetchCoordinator {
        FetchCoordinator::new(order, on_error).expect("coordinator")
    }

    #[test]
    fn all_inline_fires_during_dispatch() {
        let c = coordinator(FragmentOrder::Discovery, FetchFailurePolicy::Abort);
        let aggregation = c.dispatch(vec![inline("a.ts", "a"), inline("b.ts", "b")]);

        match aggregation {
            Aggregation::Ready(Ok(program)) => assert_eq!(program.names(), vec!["a.ts", "b.ts"]),
            other => panic!("expected ready program, got {other:?}"),
        }
    }

    #[test]
    fn zero_fragments_fire_during_dispatch() {
        let c = coordinator(FragmentOrder::Completion, FetchFailurePolicy::Abort);
        match c.dispatch(Vec::new()) {
            Aggregation::Ready(Ok(program)) => assert!(program.is_empty()),
            other => panic!("expected empty ready program, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn discovery_order_interleaves_remote_fragments() {
        let server = MockServer::start().await;
        serve(&server, "b.ts", "remote b", 200).await;
        serve(&server, "d.ts", "remote d", 0).await;

        let c = coordinator(FragmentOrder::Discovery, FetchFailurePolicy::Abort);
        let aggregation = c.dispatch(vec![
            inline("a.ts", "a"),
            remote(&server, "b.ts"),
            inline("c.ts", "c"),
            remote(&server, "d.ts"),
        ]);
        assert!(!aggregation.is_ready());

        let program = aggregation.join().await.expect("program");
        assert_eq!(program.names(), vec!["a.ts", "b.ts", "c.ts", "d.ts"]);
        assert_eq!(program.files[1].content, "remote b");
    }

    #[tokio::test]
    async fn completion_order_appends_remote_after_inline() {
        let server = MockServer::start().await;
        serve(&server, "b.ts", "remote b", 400).await;
        serve(&server, "d.ts", "remote d", 0).await;

        let c = coordinator(FragmentOrder::Completion, FetchFailurePolicy::Abort);
        let program = c
            .gather(vec![
                inline("a.ts", "a"),
                remote(&server, "b.ts"),
                inline("c.ts", "c"),
                remote(&server, "d.ts"),
            ])
            .await
            .expect("program");

        assert_eq!(program.names(), vec!["a.ts", "c.ts", "d.ts", "b.ts"]);
    }

    #[tokio::test]
    async fn every_fragment_is_fetched_once_and_counted() {
        let server = MockServer::start().await;
        let mut sources = Vec::new();
        for i in 0..6 {
            let name = format!("r{i}.ts");
            serve(&server, &name, &format!("body {i}"), (i * 20) as u64).await;
            sources.push(remote(&server, &name));
            sources.push(inline(&format!("l{i}.ts"), ""));
        }

        let c = coordinator(FragmentOrder::Discovery, FetchFailurePolicy::Abort);
        let program = c.gather(sources).await.expect("program");
        assert_eq!(program.len(), 12);
        assert_eq!(program.files[4].name, "r2.ts");
        assert_eq!(program.files[4].content, "body 2");
    }

    #[tokio::test]
    async fn abort_policy_surfaces_fetch_failure() {
        let server = MockServer::start().await;
        serve(&server, "ok.ts", "fine", 0).await;
        Mock::given(method("GET"))
            .and(path("/gone.ts"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .expect(1)
            .mount(&server)
            .await;

        let c = coordinator(FragmentOrder::Discovery, FetchFailurePolicy::Abort);
        let err = c
            .gather(vec![remote(&server, "ok.ts"), remote(&server, "gone.ts")])
            .await
            .unwrap_err();

        match err {
            RelayError::FetchFailed { location, message } => {
                assert!(location.ends_with("/gone.ts"));
                assert!(message.contains("404"));
            }
            other => panic!("expected FetchFailed, got {other}"),
        }
    }

    #[tokio::test]
    async fn tolerate_policy_keeps_partial_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.ts"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream broke"))
            .mount(&server)
            .await;

        let c = coordinator(FragmentOrder::Discovery, FetchFailurePolicy::Tolerate);
        let program = c
            .gather(vec![inline("a.ts", "a"), remote(&server, "gone.ts")])
            .await
            .expect("tolerated");

        assert_eq!(program.len(), 2);
        assert_eq!(program.files[1].content, "upstream broke");
    }

    #[tokio::test]
    async fn file_locations_are_read_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("local.ts");
        std::fs::write(&file, "export const x = 1;").expect("write");

        let c = coordinator(FragmentOrder::Discovery, FetchFailurePolicy::Abort);
        let program = c
            .gather(vec![FragmentSource::Remote {
                kind: FragmentKind::Source,
                name: "local.ts".into(),
                location: Url::from_file_path(&file).unwrap(),
            }])
            .await
            .expect("program");

        assert_eq!(program.files[0].content, "export const x = 1;");
    }
}
