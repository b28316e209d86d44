use std::io;
use std::time::Duration;
use std::time::Instant;

use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use ratatui::Terminal;

use lazytf_core::{AuthStatus, FocusPanel, LineCategory, LineSource, Modal, ACTION_ITEMS};

use crate::app::App;
use crate::keymap::map_key;
use crate::keymap::map_mouse;

const POLL_INTERVAL: Duration = Duration::from_millis(16);

struct TuiGuard;

impl Drop for TuiGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            io::stdout(),
            LeaveAlternateScreen,
            DisableMouseCapture,
            crossterm::cursor::Show
        );
    }
}

pub fn run(mut app: App) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        crossterm::cursor::Hide
    )?;
    let _guard = TuiGuard;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    run_app(&mut terminal, &mut app).map_err(|e| e.into())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        if !app.tick(Instant::now()) {
            return Ok(());
        }

        terminal.draw(|f| draw(f, app))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let action = match event::read()? {
            Event::Key(key) => map_key(key),
            Event::Mouse(mouse) => map_mouse(mouse),
            _ => None,
        };
        if let Some(action) = action {
            if !app.handle(action, Instant::now()) {
                return Ok(());
            }
        }
    }
}

#[derive(Clone, Copy)]
struct UiPalette {
    accent: Color,
    success: Color,
    warning: Color,
    danger: Color,
    notice: Color,
    replaced: Color,
    muted: Color,
    selected_bg: Color,
}

const PALETTE: UiPalette = UiPalette {
    accent: Color::Cyan,
    success: Color::Green,
    warning: Color::Yellow,
    danger: Color::Red,
    notice: Color::Blue,
    replaced: Color::Magenta,
    muted: Color::DarkGray,
    selected_bg: Color::DarkGray,
};

fn category_style(category: LineCategory, palette: UiPalette) -> Style {
    match category {
        LineCategory::Info => Style::default(),
        LineCategory::Notice => Style::default().fg(palette.notice),
        LineCategory::Warning => Style::default()
            .fg(palette.warning)
            .add_modifier(Modifier::BOLD),
        LineCategory::Error => Style::default()
            .fg(palette.danger)
            .add_modifier(Modifier::BOLD),
        LineCategory::ResourceAdded => Style::default().fg(palette.success),
        LineCategory::ResourceChanged => Style::default().fg(palette.warning),
        LineCategory::ResourceDestroyed => Style::default().fg(palette.danger),
        LineCategory::ResourceReplaced => Style::default().fg(palette.replaced),
        LineCategory::Summary => Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::BOLD),
    }
}

fn auth_color(status: AuthStatus, palette: UiPalette) -> Color {
    match status {
        AuthStatus::Unknown => palette.muted,
        AuthStatus::Checking => palette.warning,
        AuthStatus::Ready => palette.success,
        AuthStatus::Failed => palette.danger,
    }
}

fn panel_block(title: impl Into<Line<'static>>, focused: bool, palette: UiPalette) -> Block<'static> {
    let border_style = if focused {
        Style::default().fg(palette.accent)
    } else {
        Style::default()
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style)
}

fn draw(f: &mut Frame, app: &App) {
    let palette = PALETTE;
    let state = app.state();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(0),    // Panels
            Constraint::Length(2), // Footer
        ])
        .split(f.area());

    render_header(f, chunks[0], app, palette);

    if state.fullscreen {
        render_output(f, chunks[1], app, palette);
    } else {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(28),
                Constraint::Percentage(28),
                Constraint::Percentage(44),
            ])
            .split(chunks[1]);
        render_accounts(f, columns[0], app, palette);
        render_actions(f, columns[1], app, palette);
        render_output(f, columns[2], app, palette);
    }

    render_footer(f, chunks[2], app, palette);

    match &state.modal {
        Modal::ApplyConfirm { account, workspace } => {
            render_apply_confirm(f, account, workspace.as_deref(), palette)
        }
        Modal::Help => render_help(f, palette),
        Modal::None => {}
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App, palette: UiPalette) {
    let state = app.state();
    let operation = match app.slot().current() {
        Some(current) => format!(
            "{} on {} ({})",
            current.kind().label(),
            current.account(),
            current.phase().label()
        ),
        None => "idle".to_string(),
    };
    let mode = if state.fullscreen { "output" } else { "split" };
    let line = Line::from(vec![
        Span::styled(
            " lazytf ",
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "| {operation} | mode: {mode} | focus: {} ",
            state.focus.label()
        )),
        Span::styled(
            format!("| {}", state.status_line),
            Style::default().fg(palette.muted),
        ),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn render_footer(f: &mut Frame, area: Rect, app: &App, palette: UiPalette) {
    let lines = if app.state().fullscreen {
        vec![
            Line::from("z/esc:exit fullscreen  ?:help  pgup/pgdn g/G mouse:scroll  c:cancel (again=force)  q:quit"),
            Line::from("output-only mode for plan review"),
        ]
    } else {
        vec![
            Line::from("j/k or arrows: move  tab/h/l: panel  enter: run  z:fullscreen output  ?:help  a:aws login  s:auth check"),
            Line::from("r:reload config  w:workspaces  i:init  p:plan  A then y:apply  c:cancel (again=force)  q:quit  pgup/pgdn g/G/mouse:output scroll"),
        ]
    };
    let p = Paragraph::new(lines).style(Style::default().fg(palette.muted));
    f.render_widget(p, area);
}

fn render_accounts(f: &mut Frame, area: Rect, app: &App, palette: UiPalette) {
    let state = app.state();
    let items: Vec<ListItem> = state
        .accounts
        .iter()
        .enumerate()
        .map(|(idx, view)| {
            let marker = if idx == state.selected_account { "> " } else { "  " };
            let unresolved = app
                .registry()
                .get(&view.name)
                .is_some_and(|entry| entry.resolved.is_err());
            let label = if unresolved {
                "invalid config"
            } else {
                view.auth.label()
            };
            let name_style = if unresolved {
                Style::default().fg(palette.danger)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![
                Span::raw(marker),
                Span::styled(
                    view.auth.icon(),
                    Style::default().fg(auth_color(view.auth, palette)),
                ),
                Span::styled(format!(" {} [{label}]", view.name), name_style),
            ]))
        })
        .collect();

    let block = panel_block("Accounts", state.focus == FocusPanel::Accounts, palette);
    if items.is_empty() {
        let p = Paragraph::new("  (no accounts configured)").block(block);
        f.render_widget(p, area);
        return;
    }
    f.render_widget(List::new(items).block(block), area);
}

fn render_actions(f: &mut Frame, area: Rect, app: &App, palette: UiPalette) {
    let state = app.state();
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(ACTION_ITEMS.len() as u16 + 2),
            Constraint::Length(WORKSPACE_ROWS + 2),
            Constraint::Min(0),
        ])
        .split(area);

    let items: Vec<ListItem> = ACTION_ITEMS
        .iter()
        .map(|item| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:>5} ", item.key), Style::default().fg(palette.accent)),
                Span::raw(item.title),
            ]))
        })
        .collect();
    let focused = state.focus == FocusPanel::Actions;
    let list = List::new(items)
        .block(panel_block("Actions", focused, palette))
        .highlight_style(Style::default().bg(palette.selected_bg));
    let mut list_state = ListState::default();
    if focused {
        list_state.select(Some(state.selected_action));
    }
    f.render_stateful_widget(list, sections[0], &mut list_state);

    render_workspaces(f, sections[1], app, palette);
    render_details(f, sections[2], app, palette);
}

const WORKSPACE_ROWS: u16 = 5;

fn render_workspaces(f: &mut Frame, area: Rect, app: &App, palette: UiPalette) {
    let state = app.state();
    let focused = state.focus == FocusPanel::Workspaces;
    let block = panel_block("Workspaces", focused, palette);
    let Some(view) = state.selected_account_view().filter(|view| !view.workspaces.is_empty())
    else {
        let p = Paragraph::new("  (press w to list)")
            .style(Style::default().fg(palette.muted))
            .block(block);
        f.render_widget(p, area);
        return;
    };

    let items: Vec<ListItem> = view
        .workspaces
        .iter()
        .map(|workspace| {
            if view.current_workspace.as_deref() == Some(workspace.as_str()) {
                ListItem::new(Line::from(Span::styled(
                    format!("* {workspace}"),
                    Style::default().fg(palette.success),
                )))
            } else {
                ListItem::new(format!("  {workspace}"))
            }
        })
        .collect();
    let list = List::new(items)
        .block(block)
        .highlight_symbol("> ")
        .highlight_style(Style::default().bg(palette.selected_bg));
    let mut list_state = ListState::default();
    list_state.select(view.selected_workspace);
    f.render_stateful_widget(list, area, &mut list_state);
}

fn render_details(f: &mut Frame, area: Rect, app: &App, palette: UiPalette) {
    let state = app.state();
    let label_style = Style::default().fg(palette.muted);
    let mut lines = Vec::new();

    let Some(name) = state.selected_account_name() else {
        let p = Paragraph::new("  (no account selected)")
            .block(panel_block("Details", false, palette));
        f.render_widget(p, area);
        return;
    };

    if let Some(entry) = app.registry().get(name) {
        lines.push(Line::from(vec![
            Span::styled("profile   ", label_style),
            Span::raw(entry.profile().unwrap_or("-").to_string()),
        ]));
        if let Some(region) = entry.region() {
            lines.push(Line::from(vec![
                Span::styled("region    ", label_style),
                Span::raw(region.to_string()),
            ]));
        }
        match &entry.resolved {
            Ok(resolution) => {
                lines.push(Line::from(vec![
                    Span::styled("directory ", label_style),
                    Span::raw(resolution.composition_dir.display().to_string()),
                ]));
                for file in &resolution.var_files {
                    lines.push(Line::from(vec![
                        Span::styled("var file  ", label_style),
                        Span::raw(file.path.display().to_string()),
                    ]));
                }
            }
            Err(err) => lines.push(Line::from(Span::styled(
                err.to_string(),
                Style::default().fg(palette.danger),
            ))),
        }
    }

    if let Some(view) = state.account_view(name) {
        if let Some(identity) = &view.identity {
            lines.push(Line::from(vec![
                Span::styled("identity  ", label_style),
                Span::raw(identity.arn.clone()),
            ]));
        }
        if let Some(workspace) = view.selected_workspace_name() {
            lines.push(Line::from(vec![
                Span::styled("plan in   ", label_style),
                Span::raw(workspace.to_string()),
            ]));
        }
    }

    let p = Paragraph::new(lines)
        .block(panel_block("Details", false, palette))
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

/// Maps the bottom-relative scroll onto a top offset for a panel of `height` rows.
fn scroll_offset(total: usize, height: u16, from_bottom: usize) -> (usize, usize) {
    let visible = height.saturating_sub(2) as usize;
    let max = total.saturating_sub(visible);
    let from_bottom = from_bottom.min(max);
    (max - from_bottom, from_bottom)
}

fn render_output(f: &mut Frame, area: Rect, app: &App, palette: UiPalette) {
    let state = app.state();
    let output = app.slot().output();
    let lines: Vec<Line> = output
        .iter()
        .map(|line| {
            let style = category_style(line.category, palette);
            match line.source {
                LineSource::Process => Line::from(Span::styled(line.text.as_str(), style)),
                LineSource::Notice => Line::from(vec![
                    Span::styled("» ", Style::default().fg(palette.muted)),
                    Span::styled(line.text.as_str(), style),
                ]),
            }
        })
        .collect();

    let (top, from_bottom) = scroll_offset(lines.len(), area.height, state.scroll_from_bottom);
    let title = if from_bottom > 0 {
        format!("Output (scroll +{from_bottom})")
    } else {
        "Output".to_string()
    };
    let block = panel_block(title, state.focus == FocusPanel::Output, palette);
    let p = Paragraph::new(lines)
        .block(block)
        .scroll((top.min(u16::MAX as usize) as u16, 0));
    f.render_widget(p, area);
}

fn render_apply_confirm(
    f: &mut Frame,
    account: &str,
    workspace: Option<&str>,
    palette: UiPalette,
) {
    let area = centered_rect(65, 20, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .title("Confirm")
        .borders(Borders::ALL)
        .border_style(
            Style::default()
                .fg(palette.warning)
                .add_modifier(Modifier::BOLD),
        );
    let text = vec![
        Line::from(Span::styled(
            format!("Apply confirmation for {account}"),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(match workspace {
            Some(workspace) => format!("in workspace {workspace}"),
            None => "in the current workspace".to_string(),
        }),
        Line::from("Press `y` to run terraform apply"),
        Line::from("Use any other key to cancel"),
    ];
    let p = Paragraph::new(text)
        .block(block)
        .alignment(Alignment::Center);
    f.render_widget(p, area);
}

fn render_help(f: &mut Frame, palette: UiPalette) {
    let area = centered_rect(82, 70, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .title("Keybindings")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent));
    let heading = |text: &'static str| {
        Line::from(Span::styled(
            text,
            Style::default().add_modifier(Modifier::BOLD),
        ))
    };

    let help_text = vec![
        heading("Global"),
        Line::from("  ?            Toggle this help"),
        Line::from("  q            Quit (cancels a running operation first)"),
        Line::from("  Ctrl+C       Quit gracefully"),
        Line::from("  c            Cancel: first SIGINT, again to force kill"),
        Line::from(""),
        heading("Layout & Focus"),
        Line::from("  Tab/h/l      Switch panel (accounts, actions, workspaces, output)"),
        Line::from("  z            Toggle fullscreen output"),
        Line::from("  Esc          Leave fullscreen, dismiss a finished run"),
        Line::from(""),
        heading("Navigation"),
        Line::from("  j/k, arrows  Move selection or scroll output"),
        Line::from("  PgUp/PgDn    Scroll output by a page"),
        Line::from("  g/G          Jump to top/bottom of output"),
        Line::from("  Mouse wheel  Scroll output"),
        Line::from(""),
        heading("Actions"),
        Line::from("  Enter        Run the selected action"),
        Line::from("  a            AWS SSO login, then credential check"),
        Line::from("  s            Check credentials"),
        Line::from("  r            Reload config"),
        Line::from("  w            List terraform workspaces"),
        Line::from("  Enter        In workspaces: plan and apply switch to it first"),
        Line::from("  i            terraform init"),
        Line::from("  p            terraform plan"),
        Line::from("  A then y     terraform apply"),
    ];
    let p = Paragraph::new(help_text)
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use std::fs;

    use lazytf_core::ConfigResolver;
    use lazytf_core::OperationKind;
    use lazytf_core::UserAction;
    use lazytf_exec::CommandExecutionEngine;
    use lazytf_exec::SimulatedLauncher;
    use lazytf_exec::TerraformAdapter;
    use pretty_assertions::assert_eq;
    use ratatui::backend::TestBackend;

    use super::*;

    fn app(dir: &std::path::Path) -> App {
        app_with(dir, SimulatedLauncher::new())
    }

    fn app_with(dir: &std::path::Path, launcher: SimulatedLauncher) -> App {
        fs::create_dir_all(dir.join("envs/non-prod")).expect("mkdir");
        fs::write(
            dir.join("config.yaml"),
            "accounts:\n  non-prod:\n    aws_profile: np-admin\n    composition_path: envs/non-prod\n  prod:\n    aws_profile: prod-admin\n    composition_path: envs/prod\n",
        )
        .expect("write");
        let resolver = ConfigResolver::locate(dir, None).expect("locate");
        let registry = resolver.load().expect("load");
        let engine = CommandExecutionEngine::new(
            Box::new(launcher),
            Box::new(TerraformAdapter::default()),
            Duration::from_secs(10),
        );
        App::new(resolver, registry, engine)
    }

    fn render(app: &App) -> String {
        let backend = TestBackend::new(140, 40);
        let mut terminal = Terminal::new(backend).expect("terminal");
        terminal.draw(|f| draw(f, app)).expect("draw");
        let buffer = terminal.backend().buffer();
        let mut screen = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                screen.push_str(buffer[(x, y)].symbol());
            }
            screen.push('\n');
        }
        screen
    }

    #[test]
    fn split_layout_lists_accounts_and_flags_invalid_ones() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app(dir.path());
        let screen = render(&app);

        assert!(screen.contains(" lazytf "));
        assert!(screen.contains("mode: split"));
        assert!(screen.contains("> ? non-prod [unknown]"));
        assert!(screen.contains("prod [invalid config]"));
        assert!(screen.contains("terraform plan"));
    }

    #[test]
    fn modals_render_over_the_panels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = app(dir.path());

        app.handle(UserAction::BeginApply, Instant::now());
        let screen = render(&app);
        assert!(screen.contains("Press `y` to run terraform apply"));
        assert!(screen.contains("in the current workspace"));

        app.handle(UserAction::Dismiss, Instant::now());
        app.handle(UserAction::ToggleHelp, Instant::now());
        let screen = render(&app);
        assert!(screen.contains("Layout & Focus"));
    }

    #[test]
    fn workspaces_panel_marks_current_and_feeds_apply_confirmation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let launcher = SimulatedLauncher::new();
        let mut app = app_with(dir.path(), launcher.clone());
        assert!(render(&app).contains("(press w to list)"));

        app.handle(UserAction::Run(OperationKind::WorkspaceList), Instant::now());
        let id = launcher.last_execution().expect("list");
        launcher.emit_line(id, "  default");
        launcher.emit_line(id, "* blue");
        launcher.exit(id, Some(0));
        app.tick(Instant::now());

        let screen = render(&app);
        assert!(screen.contains("* blue"));
        assert!(screen.contains("plan in   blue"));

        app.handle(UserAction::BeginApply, Instant::now());
        assert!(render(&app).contains("in workspace blue"));
    }

    #[test]
    fn fullscreen_shows_output_only_footer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = app(dir.path());
        app.handle(UserAction::ToggleFullscreen, Instant::now());

        let screen = render(&app);
        assert!(screen.contains("mode: output"));
        assert!(screen.contains("output-only mode for plan review"));
        assert!(!screen.contains("Accounts"));
    }

    #[test]
    fn scroll_offset_clamps_to_content() {
        assert_eq!(scroll_offset(25, 12, 0), (15, 0));
        assert_eq!(scroll_offset(25, 12, 4), (11, 4));
        assert_eq!(scroll_offset(25, 12, 40), (0, 15));
        assert_eq!(scroll_offset(3, 12, 2), (0, 0));
    }
}
