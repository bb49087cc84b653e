use std::{io, sync::Arc, thread, time::Duration};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use f1season_core::{
    commands::{Announcement, Announcer, Command, Reply, ReplyBody, SeasonCommands, Visibility},
    draft::{ClaimBoard, BOARD_ROW_WIDTH},
    models::{Claimant, Season, SeasonStatus, MAX_ROUNDS, TEAM_NAMES},
    standings::Overview,
    weekend::Award,
    WeekendResult,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::{spawn, sync::mpsc};
use tracing::{error, info, warn};

const TICK_RATE: Duration = Duration::from_millis(250);
const MAX_FEED_LINES: usize = 200;
const ACCENT: Color = Color::Red;
const MUTED: Color = Color::DarkGray;

enum AppEvent {
    Input(Event),
    Tick,
    Replied {
        command: &'static str,
        reply: Option<Reply>,
    },
    Announced {
        channel: String,
        announcement: Announcement,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Board,
    Standings,
    Feed,
}

impl Screen {
    fn next(self) -> Self {
        match self {
            Screen::Board => Screen::Standings,
            Screen::Standings => Screen::Feed,
            Screen::Feed => Screen::Board,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Screen::Board => "Claim Board",
            Screen::Standings => "Standings",
            Screen::Feed => "Feed",
        }
    }
}

/// Announcer that posts into the in-app feed for the configured channels.
pub struct FeedAnnouncer {
    channels: Vec<String>,
    sender: mpsc::Sender<AppEvent>,
}

impl Announcer for FeedAnnouncer {
    fn resolve(&self, channel: &str) -> bool {
        self.channels.iter().any(|known| known == channel)
    }

    fn announce(&self, channel: &str, announcement: Announcement) {
        let event = AppEvent::Announced {
            channel: channel.to_string(),
            announcement,
        };
        if self.sender.try_send(event).is_err() {
            warn!(channel, "announcement dropped, feed is not accepting events");
        }
    }
}

/// Wiring shared by the app and the announcer.
pub struct EventBus {
    sender: mpsc::Sender<AppEvent>,
    receiver: mpsc::Receiver<AppEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel(128);
        Self { sender, receiver }
    }

    pub fn announcer(&self, channels: Vec<String>) -> FeedAnnouncer {
        FeedAnnouncer {
            channels,
            sender: self.sender.clone(),
        }
    }
}

/// Terminal console that hosts the season commands.
pub struct SeasonApp {
    commands: Arc<SeasonCommands>,
    operator: Claimant,
    channel: String,
    bus: Option<EventBus>,
    event_tx: Option<mpsc::Sender<AppEvent>>,
    state: UiState,
}

impl SeasonApp {
    pub fn new(
        commands: Arc<SeasonCommands>,
        operator: Claimant,
        channel: String,
        bus: EventBus,
    ) -> Self {
        Self {
            commands,
            operator,
            channel,
            bus: Some(bus),
            event_tx: None,
            state: UiState::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        self.refresh_season();
        match &self.state.season {
            Some(season) => self.state.set_status(format!(
                "Loaded season {} (round {}/{MAX_ROUNDS})",
                season.season_id, season.round
            )),
            None => self
                .state
                .set_status("No season yet. Press 's' to start one".to_string()),
        }

        let EventBus {
            sender: event_tx,
            receiver: mut event_rx,
        } = self.bus.take().context("event bus already consumed")?;

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        spawn_input_thread(event_tx.clone());
        self.event_tx = Some(event_tx);

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.state.should_quit {
                break;
            }
            let maybe_event = event_rx.recv().await;
            if !self.process_app_event(maybe_event) {
                break;
            }
        }

        restore_terminal(&mut terminal)?;
        self.event_tx = None;
        Ok(())
    }

    fn refresh_season(&mut self) {
        match self.commands.repository().snapshot() {
            Ok(season) => self.state.season = season,
            Err(err) => {
                error!(?err, "Failed to read season");
                self.state.set_status(format!("Failed to read season: {err}"));
            }
        }
    }

    fn reload_season(&mut self) {
        match self.commands.repository().reload() {
            Ok(season) => {
                let status = match &season {
                    Some(season) => format!(
                        "Reloaded season {} (revision {})",
                        season.season_id, season.revision
                    ),
                    None => "No season on disk".to_string(),
                };
                self.state.season = season;
                self.state.set_status(status);
            }
            Err(err) => {
                error!(?err, "Failed to reload season");
                self.state.set_status(err.user_message());
            }
        }
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(Event::Key(key))) => {
                self.handle_key(key);
                true
            }
            Some(AppEvent::Input(_)) | Some(AppEvent::Tick) => true,
            Some(AppEvent::Replied { command, reply }) => {
                self.state.pending = self.state.pending.saturating_sub(1);
                self.refresh_season();
                match reply {
                    Some(reply) => self.apply_reply(command, reply),
                    None => info!(command, "Action ignored"),
                }
                true
            }
            Some(AppEvent::Announced {
                channel,
                announcement,
            }) => {
                self.state
                    .push_feed(format!("#{channel}: {}", announcement.headline()));
                let Announcement::ClaimPrompt { board, .. } = announcement;
                self.state.push_feed(format!(
                    "#{channel}: {} teams open for claiming",
                    board.buttons().filter(|button| !button.disabled).count()
                ));
                self.state.board = Some(board);
                true
            }
            None => false,
        }
    }

    fn apply_reply(&mut self, command: &'static str, reply: Reply) {
        let prefix = match reply.visibility {
            Visibility::Private => "(only you)",
            Visibility::Public => "(everyone)",
        };
        match reply.body {
            ReplyBody::Text(text) => {
                self.state.push_feed(format!("{prefix} {command}: {text}"));
                self.state.set_status(text);
            }
            ReplyBody::Overview(overview) => {
                self.state.push_feed(format!("{prefix} {}", overview.title()));
                self.state.overview = Some(overview);
                self.state.screen = Screen::Standings;
                self.state.set_status("Standings refreshed".to_string());
            }
            ReplyBody::Weekend {
                result,
                awards,
                final_round,
            } => {
                for line in weekend_lines(&result, &awards) {
                    self.state.push_feed(format!("{prefix} {line}"));
                }
                let mut status = format!("Round {} simulated", result.round);
                if final_round {
                    status.push_str(" • season complete");
                }
                self.state.last_weekend = Some((result, awards));
                self.state.set_status(status);
            }
            ReplyBody::Board {
                team,
                owner,
                board,
                notice,
            } => {
                self.state
                    .push_feed(format!("{prefix} {owner} claimed {team}"));
                self.state.board = Some(board);
                match notice {
                    Some(notice) => {
                        self.state.push_feed(notice.clone());
                        self.state.set_status(notice);
                    }
                    None => self.state.set_status(format!("{team} is yours")),
                }
            }
        }
    }

    fn dispatch(&mut self, command: Command) {
        let Some(sender) = self.event_tx.clone() else {
            return;
        };
        let commands = self.commands.clone();
        let name = command.name();
        self.state.pending += 1;
        self.state.set_status(format!("Running {name}…"));
        spawn(async move {
            let reply = commands.handle(command).await;
            if sender
                .send(AppEvent::Replied {
                    command: name,
                    reply,
                })
                .await
                .is_err()
            {
                warn!(command = name, "Reply dropped after shutdown");
            }
        });
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.state.should_quit = true;
            }
            KeyCode::Tab => {
                self.state.screen = self.state.screen.next();
            }
            KeyCode::Char('s') => self.dispatch(Command::StartSeason),
            KeyCode::Char('o') => self.dispatch(Command::TeamOverview),
            KeyCode::Char('a') => self.dispatch(Command::AdvanceWeekend),
            KeyCode::Char('r') => {
                self.reload_season();
            }
            KeyCode::Left | KeyCode::Char('h') if self.state.screen == Screen::Board => {
                self.state.move_cursor(-1, 0)
            }
            KeyCode::Right | KeyCode::Char('l') if self.state.screen == Screen::Board => {
                self.state.move_cursor(1, 0)
            }
            KeyCode::Up | KeyCode::Char('k') if self.state.screen == Screen::Board => {
                self.state.move_cursor(0, -1)
            }
            KeyCode::Down | KeyCode::Char('j') if self.state.screen == Screen::Board => {
                self.state.move_cursor(0, 1)
            }
            KeyCode::Enter if self.state.screen == Screen::Board => self.claim_selected(),
            _ => {}
        }
    }

    fn claim_selected(&mut self) {
        let board = self.state.current_board();
        let Some(button) = board.as_ref().and_then(|board| board.buttons().nth(self.state.cursor))
        else {
            self.state
                .set_status("No claim board yet. Press 's' to start a season".to_string());
            return;
        };
        if button.disabled {
            self.state.set_status(format!("{} is not available", button.team));
            return;
        }
        let token = button.token.clone();
        self.dispatch(Command::Claim {
            token,
            claimant: self.operator.clone(),
        });
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(area);

        self.render_header(frame, chunks[0]);
        match self.state.screen {
            Screen::Board => self.render_board_screen(frame, chunks[1]),
            Screen::Standings => self.render_standings(frame, chunks[1]),
            Screen::Feed => self.render_feed(frame, chunks[1]),
        }
        self.render_status(frame, chunks[2]);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let summary = match &self.state.season {
            Some(season) => {
                let status = match season.status {
                    SeasonStatus::Active => "active",
                    SeasonStatus::Complete => "complete",
                };
                format!(
                    "Season {} • Round {}/{MAX_ROUNDS} • {status} • {} of {} teams claimed",
                    season.season_id,
                    season.round,
                    season.owned_teams().len(),
                    TEAM_NAMES.len()
                )
            }
            None => "No season".to_string(),
        };
        let line = Line::from(vec![
            Span::styled(
                "F1 Season ",
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            ),
            Span::raw(summary),
        ]);
        let paragraph = Paragraph::new(line)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(self.state.screen.title()),
            )
            .alignment(Alignment::Center);
        frame.render_widget(paragraph, area);
    }

    fn render_board_screen(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);
        self.render_board(frame, columns[0]);
        self.render_last_weekend(frame, columns[1]);
    }

    fn render_board(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Teams (#{})", self.channel));
        let Some(board) = self.state.current_board() else {
            let paragraph = Paragraph::new("No season running. Press 's' to post the claim board.")
                .block(block)
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, area);
            return;
        };

        let inner = block.inner(area);
        frame.render_widget(block, area);
        let row_areas = Layout::default()
            .direction(Direction::Vertical)
            .constraints(
                board
                    .rows
                    .iter()
                    .map(|_| Constraint::Length(4))
                    .collect::<Vec<_>>(),
            )
            .split(inner);

        let season = self.state.season.as_ref();
        for (row_idx, (row, row_area)) in board.rows.iter().zip(row_areas.iter()).enumerate() {
            let cells = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(
                    row.iter()
                        .map(|_| Constraint::Ratio(1, BOARD_ROW_WIDTH as u32))
                        .collect::<Vec<_>>(),
                )
                .split(*row_area);
            for (col_idx, (button, cell)) in row.iter().zip(cells.iter()).enumerate() {
                let selected = self.state.cursor == row_idx * BOARD_ROW_WIDTH + col_idx;
                let owner = season
                    .and_then(|season| season.team(button.team))
                    .and_then(|team| team.owner_name.clone())
                    .unwrap_or_else(|| "open".to_string());
                let mut style = if button.disabled {
                    Style::default().fg(MUTED)
                } else {
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
                };
                let mut border = Style::default().fg(MUTED);
                if selected {
                    style = style.bg(Color::Black);
                    border = Style::default().fg(ACCENT).add_modifier(Modifier::BOLD);
                }
                let paragraph = Paragraph::new(vec![
                    Line::from(Span::styled(button.team, style)),
                    Line::from(Span::styled(owner, Style::default().fg(MUTED))),
                ])
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).border_style(border));
                frame.render_widget(paragraph, *cell);
            }
        }
    }

    fn render_last_weekend(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Last Weekend");
        let lines: Vec<Line> = match &self.state.last_weekend {
            Some((result, awards)) => weekend_lines(result, awards)
                .into_iter()
                .map(Line::from)
                .collect(),
            None => match self.state.season.as_ref().and_then(Season::last_weekend) {
                Some(result) => weekend_lines(result, &[])
                    .into_iter()
                    .map(Line::from)
                    .collect(),
                None => vec![Line::from(Span::styled(
                    "No weekend simulated yet",
                    Style::default().fg(MUTED),
                ))],
            },
        };
        let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn render_standings(&self, frame: &mut Frame, area: Rect) {
        let overview = self
            .state
            .season
            .as_ref()
            .map(Overview::from_season)
            .or_else(|| self.state.overview.clone());
        let Some(overview) = overview else {
            let paragraph = Paragraph::new("No season has been created yet.")
                .block(Block::default().borders(Borders::ALL).title("Standings"));
            frame.render_widget(paragraph, area);
            return;
        };
        let items: Vec<ListItem> = overview
            .rows
            .iter()
            .map(|row| {
                let style = if row.owner.is_some() {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(MUTED)
                };
                ListItem::new(Line::from(Span::styled(row.render(), style)))
            })
            .collect();
        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{} • {}", overview.title(), overview.footer())),
        );
        frame.render_widget(list, area);
    }

    fn render_feed(&self, frame: &mut Frame, area: Rect) {
        let height = area.height.saturating_sub(2) as usize;
        let skip = self.state.feed.len().saturating_sub(height);
        let items: Vec<ListItem> = self
            .state
            .feed
            .iter()
            .skip(skip)
            .map(|line| ListItem::new(line.as_str()))
            .collect();
        let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Feed"));
        frame.render_widget(list, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Status");
        let mut primary = self.state.status.clone();
        if self.state.pending > 0 {
            primary.push_str(&format!("  ({} pending)", self.state.pending));
        }
        let secondary = format!(
            "Playing as {} • s start • a advance • o overview • Enter claim • Tab switch • q quit",
            self.operator.name
        );
        let paragraph = Paragraph::new(vec![Line::from(primary), Line::from(secondary)])
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

fn weekend_lines(result: &WeekendResult, awards: &[Award]) -> Vec<String> {
    let mut lines = vec![format!("Weekend Simulation - Round {}", result.round)];
    lines.push("Qualifying:".to_string());
    lines.extend(
        result
            .qualifying
            .iter()
            .enumerate()
            .map(|(idx, team)| format!("  {}. {team}", idx + 1)),
    );
    lines.push("Race:".to_string());
    lines.extend(result.race.iter().enumerate().map(|(idx, team)| {
        match awards.iter().find(|award| &award.team == team) {
            Some(award) => format!("  {}. {team} +{} P", idx + 1, award.points),
            None => format!("  {}. {team}", idx + 1),
        }
    }));
    lines
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

struct UiState {
    season: Option<Season>,
    board: Option<ClaimBoard>,
    overview: Option<Overview>,
    last_weekend: Option<(WeekendResult, Vec<Award>)>,
    feed: Vec<String>,
    cursor: usize,
    pending: usize,
    status: String,
    screen: Screen,
    should_quit: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            season: None,
            board: None,
            overview: None,
            last_weekend: None,
            feed: Vec::new(),
            cursor: 0,
            pending: 0,
            status: "Ready".to_string(),
            screen: Screen::Board,
            should_quit: false,
        }
    }
}

impl UiState {
    fn set_status(&mut self, message: String) {
        self.status = message;
    }

    fn push_feed(&mut self, line: String) {
        self.feed.push(line);
        if self.feed.len() > MAX_FEED_LINES {
            let excess = self.feed.len() - MAX_FEED_LINES;
            self.feed.drain(..excess);
        }
    }

    /// Board for the committed season; the last reply's board if the season vanished.
    fn current_board(&self) -> Option<ClaimBoard> {
        match &self.season {
            Some(season) if season.is_active() => Some(ClaimBoard::from_season(season)),
            Some(_) => None,
            None => self.board.clone(),
        }
    }

    fn move_cursor(&mut self, dx: isize, dy: isize) {
        let total = TEAM_NAMES.len() as isize;
        let width = BOARD_ROW_WIDTH as isize;
        let next = self.cursor as isize + dx + dy * width;
        if (0..total).contains(&next) {
            self.cursor = next as usize;
        }
    }
}
