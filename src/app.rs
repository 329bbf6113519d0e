//! Application state management for todoquery
//!
//! This module holds the page state, handles keyboard input, and wires the
//! current page's query and mutation to the shared query cache.

use crossterm::event::{KeyCode, KeyEvent};
use tracing::{debug, info};

use todoquery::api::{PutTodoRequest, Todo, TodoClient};
use todoquery::cli::StartupConfig;
use todoquery::observer::QueryObserver;
use todoquery::pages::{todos_root, Page};
use todoquery::query::{
    with_retry, KeyFilter, Loader, Mutation, MutationState, QueryClient, QueryState, RetryPolicy,
};

/// Mutation behind the PUT button
pub type PutTodoMutation = Mutation<PutTodoRequest, Todo, Todo>;

/// Main application struct managing state and data
pub struct App {
    /// Page currently shown
    pub page: Page,
    /// Todo id the current query is keyed on
    pub id: u64,
    /// Raw contents of the id input field
    pub id_input: String,
    /// Flag indicating the application should quit
    pub should_quit: bool,
    /// Flag to show help overlay
    pub show_help: bool,
    query_client: QueryClient<Todo>,
    api: TodoClient,
    retry: RetryPolicy,
    observer: QueryObserver<Todo>,
    mutation: PutTodoMutation,
}

impl App {
    /// Creates the app with a fresh cache and an API client for the configured base URL
    pub fn new(config: &StartupConfig) -> Self {
        let query_client = QueryClient::new(config.query.clone());
        let api = TodoClient::with_base_url(&config.base_url);
        Self::with_client(config, query_client, api)
    }

    /// Creates the app around an existing cache and API client
    ///
    /// Mounts the configured page immediately, so this needs a Tokio runtime.
    pub fn with_client(config: &StartupConfig, query_client: QueryClient<Todo>, api: TodoClient) -> Self {
        let retry = config.retry.clone();
        let loader = with_retry(api.todo_loader(config.id), retry.clone());
        let observer = QueryObserver::observe(&query_client, config.page.query_key(config.id), loader);
        let mutation = build_put_mutation(&query_client, &api);

        Self {
            page: config.page,
            id: config.id,
            id_input: config.id.to_string(),
            should_quit: false,
            show_help: false,
            query_client,
            api,
            retry,
            observer,
            mutation,
        }
    }

    /// State of the mounted query as of the last `tick`
    pub fn query_state(&self) -> &QueryState<Todo> {
        self.observer.current()
    }

    pub fn mutation_state(&self) -> MutationState<PutTodoRequest, Todo> {
        self.mutation.state()
    }

    pub fn query_client(&self) -> &QueryClient<Todo> {
        &self.query_client
    }

    /// Pulls pending cache notifications; call once per frame
    pub fn tick(&mut self) {
        self.observer.latest();
    }

    fn loader_for(&self, id: u64) -> Loader<Todo> {
        with_retry(self.api.todo_loader(id), self.retry.clone())
    }

    /// Re-subscribes to the key for the current page and id
    fn mount(&mut self) {
        let key = self.page.query_key(self.id);
        debug!(page = self.page.name(), key = %key, "mounting query");
        let loader = self.loader_for(self.id);
        self.observer = QueryObserver::observe(&self.query_client, key, loader);
    }

    pub fn set_page(&mut self, page: Page) {
        if page != self.page {
            self.page = page;
            self.mount();
        }
    }

    /// Applies the id field; an empty or unparsable field keeps the previous id
    fn apply_id_input(&mut self) {
        if let Ok(id) = self.id_input.parse::<u64>() {
            if id != self.id {
                self.id = id;
                self.mount();
            }
        }
    }

    /// Sends the demo PUT for the current id in the background
    pub fn submit_mutation(&self) {
        let request = PutTodoRequest::demo(self.id);
        info!(id = request.id, "submitting todo update");
        let mutation = self.mutation.clone();
        tokio::spawn(async move {
            // outcome is tracked in the mutation state
            let _ = mutation.mutate(request).await;
        });
    }

    /// Marks the current query stale so it refetches
    pub fn refresh(&self) {
        self.query_client
            .invalidate(KeyFilter::exact(self.observer.key().clone()));
    }

    pub fn handle_key(&mut self, key_event: KeyEvent) {
        // Handle help overlay - intercepts all keys when shown
        if self.show_help {
            if matches!(
                key_event.code,
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')
            ) {
                self.show_help = false;
            }
            return;
        }

        match key_event.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('?') => {
                self.show_help = true;
            }
            KeyCode::Tab => {
                self.set_page(self.page.next());
            }
            KeyCode::BackTab => {
                self.set_page(self.page.previous());
            }
            KeyCode::Char(c) if c.is_ascii_digit() => {
                let candidate = format!("{}{}", self.id_input, c);
                // ignore digits that would overflow the id
                if candidate.parse::<u64>().is_ok() {
                    self.id_input = candidate;
                    self.apply_id_input();
                }
            }
            KeyCode::Backspace => {
                self.id_input.pop();
                self.apply_id_input();
            }
            KeyCode::Enter | KeyCode::Char('p') if self.page.has_mutation() => {
                self.submit_mutation();
            }
            KeyCode::Char('r') => {
                self.refresh();
            }
            _ => {}
        }
    }
}

/// PUT mutation that marks every todo query stale once the server accepts it
fn build_put_mutation(query_client: &QueryClient<Todo>, api: &TodoClient) -> PutTodoMutation {
    Mutation::new(query_client.clone(), api.put_todo_fn()).on_success(
        |todo: &Todo, _request: &PutTodoRequest, client: &QueryClient<Todo>| {
            let invalidated = client.invalidate(todos_root());
            info!(id = todo.id, invalidated, "todo updated");
        },
    )
}
