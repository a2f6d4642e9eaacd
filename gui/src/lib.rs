pub mod client;
pub mod state;

pub use client::{ApiClient, ConfigResponse};
pub use state::{post_byline, PostQuery, SettingsField, SettingsForm, SortOrder};

use iced::widget::{
    button, column, container, pick_list, row, scrollable, text, text_input, Column, Space,
};
use iced::{Command, Element, Length, Theme};
use std::collections::HashMap;
use subwatch_core::{FetchSummary, MonitoredPost, MonitoredSubreddit, PostStatus};
use tracing::{error, info};

const SCORES: [u8; 10] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    Settings,
}

#[derive(Debug, Clone)]
pub enum Message {
    Refresh,
    PostsLoaded(Result<Vec<MonitoredPost>, String>),
    SubredditsLoaded(Result<Vec<MonitoredSubreddit>, String>),
    ConfigLoaded(Result<ConfigResponse, String>),
    ShowScreen(Screen),

    TabSelected(PostStatus),
    SortSelected(SortOrder),
    SubredditFilterChanged(String),
    MinScoreSelected(u8),

    FetchRequested,
    FetchFinished(Result<FetchSummary, String>),
    ClearPending,
    IgnoreAll,
    BulkFinished(Result<String, String>),

    SetStatus(i64, PostStatus),
    ReplyEdited(i64, String),
    SaveReply(i64),
    RegenerateReply(i64),
    PostUpdated(Result<MonitoredPost, String>),

    SettingsEdited(SettingsField, String),
    SaveSettings,
    NewSubredditChanged(String),
    AddSubreddit,
    RemoveSubreddit(i64),
    ToggleSubreddit(i64, bool),
    Mutated(Result<(), String>),
}

/// Dashboard client state. All data comes from the REST API and is
/// refetched after every mutation.
pub struct App {
    client: ApiClient,
    screen: Screen,
    posts: Vec<MonitoredPost>,
    subreddits: Vec<MonitoredSubreddit>,
    query: PostQuery,
    reply_drafts: HashMap<i64, String>,
    settings: SettingsForm,
    prompt_preview: String,
    new_subreddit: String,
    fetching: bool,
    last_fetch: Option<FetchSummary>,
    notice: Option<String>,
    error: Option<String>,
}

impl App {
    pub fn new(api_url: impl Into<String>) -> (Self, Command<Message>) {
        let app = Self {
            client: ApiClient::new(api_url),
            screen: Screen::Dashboard,
            posts: Vec::new(),
            subreddits: Vec::new(),
            query: PostQuery::default(),
            reply_drafts: HashMap::new(),
            settings: SettingsForm::default(),
            prompt_preview: String::new(),
            new_subreddit: String::new(),
            fetching: false,
            last_fetch: None,
            notice: None,
            error: None,
        };
        info!(api = app.client.base_url(), "Dashboard connecting");
        let load = Command::batch([app.load_posts(), app.load_subreddits(), app.load_config()]);
        (app, load)
    }

    pub fn title(&self) -> String {
        "Subwatch - Subreddit Monitor".to_string()
    }

    fn load_posts(&self) -> Command<Message> {
        let client = self.client.clone();
        Command::perform(
            async move { client.list_posts().await.map_err(|e| e.to_string()) },
            Message::PostsLoaded,
        )
    }

    fn load_subreddits(&self) -> Command<Message> {
        let client = self.client.clone();
        Command::perform(
            async move { client.list_subreddits().await.map_err(|e| e.to_string()) },
            Message::SubredditsLoaded,
        )
    }

    fn load_config(&self) -> Command<Message> {
        let client = self.client.clone();
        Command::perform(
            async move { client.get_config().await.map_err(|e| e.to_string()) },
            Message::ConfigLoaded,
        )
    }

    fn reload(&self) -> Command<Message> {
        Command::batch([self.load_posts(), self.load_subreddits(), self.load_config()])
    }

    fn show_error(&mut self, message: String) {
        error!(%message, "Dashboard request failed");
        self.error = Some(message);
    }

    pub fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::Refresh => {
                self.error = None;
                return self.reload();
            }
            Message::PostsLoaded(Ok(posts)) => {
                self.reply_drafts
                    .retain(|id, _| posts.iter().any(|p| p.id == *id));
                self.posts = posts;
            }
            Message::SubredditsLoaded(Ok(subreddits)) => self.subreddits = subreddits,
            Message::ConfigLoaded(Ok(response)) => {
                self.settings = SettingsForm::from_config(&response.config);
                self.prompt_preview = response.open_ai_prompt;
            }
            Message::PostsLoaded(Err(e))
            | Message::SubredditsLoaded(Err(e))
            | Message::ConfigLoaded(Err(e)) => self.show_error(e),
            Message::ShowScreen(screen) => self.screen = screen,

            Message::TabSelected(tab) => self.query.tab = tab,
            Message::SortSelected(sort) => self.query.sort = sort,
            Message::SubredditFilterChanged(filter) => self.query.subreddit = filter,
            Message::MinScoreSelected(score) => self.query.min_score = score,

            Message::FetchRequested => {
                self.fetching = true;
                self.notice = Some("Fetching new content...".to_string());
                let client = self.client.clone();
                return Command::perform(
                    async move { client.fetch().await.map_err(|e| e.to_string()) },
                    Message::FetchFinished,
                );
            }
            Message::FetchFinished(result) => {
                self.fetching = false;
                match result {
                    Ok(summary) => {
                        self.notice = Some(format!(
                            "Fetched {} items from {} subreddits, stored {}",
                            summary.fetched, summary.subreddits, summary.stored
                        ));
                        self.last_fetch = Some(summary);
                    }
                    Err(e) => {
                        self.notice = None;
                        self.show_error(e);
                    }
                }
                return self.load_posts();
            }
            Message::ClearPending => {
                let client = self.client.clone();
                return Command::perform(
                    async move {
                        client
                            .clear_pending()
                            .await
                            .map(|n| format!("Cleared {n} pending posts"))
                            .map_err(|e| e.to_string())
                    },
                    Message::BulkFinished,
                );
            }
            Message::IgnoreAll => {
                let client = self.client.clone();
                return Command::perform(
                    async move {
                        client
                            .ignore_all()
                            .await
                            .map(|n| format!("Ignored {n} pending posts"))
                            .map_err(|e| e.to_string())
                    },
                    Message::BulkFinished,
                );
            }
            Message::BulkFinished(result) => {
                match result {
                    Ok(notice) => self.notice = Some(notice),
                    Err(e) => self.show_error(e),
                }
                return self.load_posts();
            }

            Message::SetStatus(id, status) => {
                let client = self.client.clone();
                return Command::perform(
                    async move {
                        client
                            .set_post_status(id, status)
                            .await
                            .map_err(|e| e.to_string())
                    },
                    Message::Mutated,
                );
            }
            Message::ReplyEdited(id, reply) => {
                self.reply_drafts.insert(id, reply);
            }
            Message::SaveReply(id) => {
                let Some(reply) = self.reply_drafts.get(&id).cloned() else {
                    return Command::none();
                };
                let client = self.client.clone();
                return Command::perform(
                    async move {
                        client
                            .update_reply(id, &reply)
                            .await
                            .map_err(|e| e.to_string())
                    },
                    Message::PostUpdated,
                );
            }
            Message::RegenerateReply(id) => {
                self.notice = Some("Regenerating reply...".to_string());
                let client = self.client.clone();
                return Command::perform(
                    async move { client.regenerate_reply(id).await.map_err(|e| e.to_string()) },
                    Message::PostUpdated,
                );
            }
            Message::PostUpdated(result) => {
                match result {
                    Ok(post) => {
                        self.reply_drafts.remove(&post.id);
                        self.notice = Some(format!("Updated reply for \"{}\"", post.title));
                    }
                    Err(e) => self.show_error(e),
                }
                return self.load_posts();
            }

            Message::SettingsEdited(field, value) => self.settings.set(field, value),
            Message::SaveSettings => match self.settings.to_config() {
                Ok(config) => {
                    let client = self.client.clone();
                    self.notice = Some("Settings saved".to_string());
                    return Command::perform(
                        async move { client.save_config(&config).await.map_err(|e| e.to_string()) },
                        Message::Mutated,
                    );
                }
                Err(e) => self.error = Some(e),
            },
            Message::NewSubredditChanged(name) => self.new_subreddit = name,
            Message::AddSubreddit => {
                let name = std::mem::take(&mut self.new_subreddit);
                if name.trim().is_empty() {
                    return Command::none();
                }
                let client = self.client.clone();
                return Command::perform(
                    async move {
                        client
                            .add_subreddit(name.trim())
                            .await
                            .map(|_| ())
                            .map_err(|e| e.to_string())
                    },
                    Message::Mutated,
                );
            }
            Message::RemoveSubreddit(id) => {
                let client = self.client.clone();
                return Command::perform(
                    async move { client.remove_subreddit(id).await.map_err(|e| e.to_string()) },
                    Message::Mutated,
                );
            }
            Message::ToggleSubreddit(id, is_active) => {
                let client = self.client.clone();
                return Command::perform(
                    async move {
                        client
                            .set_subreddit_active(id, is_active)
                            .await
                            .map_err(|e| e.to_string())
                    },
                    Message::Mutated,
                );
            }
            Message::Mutated(result) => {
                match result {
                    Ok(()) => self.error = None,
                    Err(e) => self.show_error(e),
                }
                return self.reload();
            }
        }
        Command::none()
    }

    pub fn view(&self) -> Element<'_, Message, Theme> {
        let nav = row![
            text("Subwatch").size(24),
            Space::with_width(Length::Fill),
            button("Dashboard").on_press(Message::ShowScreen(Screen::Dashboard)),
            button("Settings").on_press(Message::ShowScreen(Screen::Settings)),
            button("Refresh").on_press(Message::Refresh),
        ]
        .spacing(10);

        let mut banner = Column::new().spacing(5);
        if let Some(error) = &self.error {
            banner = banner.push(text(format!("Error: {error}")).size(14));
        }
        if let Some(notice) = &self.notice {
            banner = banner.push(text(notice).size(14));
        }

        let body = match self.screen {
            Screen::Dashboard => self.dashboard_view(),
            Screen::Settings => self.settings_view(),
        };

        container(column![nav, banner, body].spacing(15))
            .width(Length::Fill)
            .height(Length::Fill)
            .padding(20)
            .into()
    }

    fn dashboard_view(&self) -> Element<'_, Message, Theme> {
        let mut fetch_button = button(if self.fetching {
            "Fetching..."
        } else {
            "Fetch new content"
        });
        if !self.fetching {
            fetch_button = fetch_button.on_press(Message::FetchRequested);
        }
        let actions = row![
            fetch_button,
            button("Clear pending").on_press(Message::ClearPending),
            button("Ignore all pending").on_press(Message::IgnoreAll),
        ]
        .spacing(10);

        let tabs = PostStatus::ALL.iter().fold(row![].spacing(10), |tabs, status| {
            let label = format!(
                "{} ({})",
                status,
                state::status_count(&self.posts, *status)
            );
            let mut tab = button(text(label));
            if *status != self.query.tab {
                tab = tab.on_press(Message::TabSelected(*status));
            }
            tabs.push(tab)
        });

        let filters = row![
            pick_list(&SortOrder::ALL[..], Some(self.query.sort), Message::SortSelected),
            text_input("Filter by subreddit", &self.query.subreddit)
                .on_input(Message::SubredditFilterChanged)
                .width(Length::Fixed(220.0)),
            text("Min score"),
            pick_list(&SCORES[..], Some(self.query.min_score), Message::MinScoreSelected),
        ]
        .spacing(10);

        let mut content = Column::new().spacing(5);
        if let Some(summary) = &self.last_fetch {
            for error in &summary.errors {
                content = content.push(text(format!("! {error}")).size(12));
            }
        }

        let visible = self.query.apply(&self.posts);
        let list: Element<'_, Message, Theme> = if visible.is_empty() {
            text("No posts match the current filters").size(16).into()
        } else {
            let cards = visible
                .into_iter()
                .fold(Column::new().spacing(10), |cards, post| cards.push(self.post_card(post)));
            scrollable(cards).height(Length::Fill).into()
        };

        column![actions, tabs, filters, content, list]
            .spacing(12)
            .into()
    }

    fn post_card<'a>(&'a self, post: &'a MonitoredPost) -> Element<'a, Message, Theme> {
        let id = post.id;
        let reply = self
            .reply_drafts
            .get(&id)
            .map(String::as_str)
            .or(post.suggested_reply.as_deref())
            .unwrap_or_default();

        let mut status_actions = row![].spacing(8);
        for (label, status) in [
            ("Mark replied", PostStatus::Replied),
            ("Ignore", PostStatus::Ignored),
            ("Back to pending", PostStatus::Pending),
        ] {
            if post.status != status {
                status_actions =
                    status_actions.push(button(label).on_press(Message::SetStatus(id, status)));
            }
        }

        let mut save = button("Save reply");
        if self.reply_drafts.contains_key(&id) {
            save = save.on_press(Message::SaveReply(id));
        }

        container(
            column![
                text(&post.title).size(16),
                text(post_byline(post)).size(12),
                text(&post.url).size(12),
                text(&post.analysis.analysis).size(14),
                text_input("Suggested reply", reply)
                    .on_input(move |value| Message::ReplyEdited(id, value)),
                row![
                    save,
                    button("Regenerate").on_press(Message::RegenerateReply(id))
                ]
                .spacing(8),
                status_actions,
            ]
            .spacing(6),
        )
        .padding(10)
        .into()
    }

    fn settings_view(&self) -> Element<'_, Message, Theme> {
        let form = &self.settings;
        let field = labeled_input;

        let config = column![
            text("Monitor settings").size(20),
            field("Score threshold (1-10)", &form.score_threshold, SettingsField::ScoreThreshold),
            field("Check frequency (hours)", &form.check_frequency, SettingsField::CheckFrequency),
            field("Posts per fetch", &form.posts_per_fetch, SettingsField::PostsPerFetch),
            field("Base prompt", &form.base_prompt, SettingsField::BasePrompt),
            field("Scoring criteria", &form.scoring_criteria, SettingsField::ScoringCriteria),
            field("Analysis guidance", &form.analysis_guidance, SettingsField::AnalysisGuidance),
            field("Reply style", &form.reply_style, SettingsField::ReplyStyle),
            button("Save settings").on_press(Message::SaveSettings),
            text("Prompt preview").size(14),
            text(&self.prompt_preview).size(12),
        ]
        .spacing(8);

        let subreddits = self.subreddits.iter().fold(
            Column::new().spacing(6),
            |list, subreddit| {
                let toggle = if subreddit.is_active {
                    "Deactivate"
                } else {
                    "Activate"
                };
                list.push(
                    row![
                        text(format!("r/{}", subreddit.name)).width(Length::Fill),
                        button(toggle)
                            .on_press(Message::ToggleSubreddit(subreddit.id, !subreddit.is_active)),
                        button("Remove").on_press(Message::RemoveSubreddit(subreddit.id)),
                    ]
                    .spacing(8),
                )
            },
        );

        let add = row![
            text_input("Subreddit name", &self.new_subreddit)
                .on_input(Message::NewSubredditChanged)
                .on_submit(Message::AddSubreddit),
            button("Add").on_press(Message::AddSubreddit),
        ]
        .spacing(8);

        scrollable(
            column![
                config,
                text("Monitored subreddits").size(20),
                add,
                subreddits
            ]
            .spacing(16),
        )
        .height(Length::Fill)
        .into()
    }
}

fn labeled_input<'a>(
    label: &'static str,
    value: &str,
    field: SettingsField,
) -> Column<'a, Message, Theme> {
    column![
        text(label).size(14),
        text_input(label, value).on_input(move |v| Message::SettingsEdited(field, v)),
    ]
    .spacing(4)
}
