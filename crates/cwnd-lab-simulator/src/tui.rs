use std::{
    io,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crate::engine::Simulator;
use crate::oracle::LossOracle;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, List, ListItem, Paragraph},
};

const MAX_LOG_LINES: usize = 1000;

/// Log sink for the TUI: tracing output is kept here instead of the terminal.
#[derive(Clone, Default)]
pub struct MemoryLogBuffer {
    logs: Arc<Mutex<Vec<String>>>,
}

impl MemoryLogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, msg: String) {
        // A poisoned buffer only means a logging thread panicked; keep the lines.
        let mut logs = self.logs.lock().unwrap_or_else(|e| e.into_inner());
        logs.push(msg);
        if logs.len() > MAX_LOG_LINES {
            logs.remove(0);
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.logs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The last `n` lines, oldest first.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let logs = self.logs.lock().unwrap_or_else(|e| e.into_inner());
        logs[logs.len().saturating_sub(n)..].to_vec()
    }
}

impl io::Write for MemoryLogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        self.push(s.trim().to_string());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct TuiApp<O> {
    simulator: Simulator<O>,
    paused: bool,
    scenario_name: Option<String>,
    logs: Option<MemoryLogBuffer>,
    /// Vertical scroll offset for the tick list
    tick_scroll: usize,
}

impl<O: LossOracle> TuiApp<O> {
    pub fn new(simulator: Simulator<O>, scenario_name: Option<String>) -> Self {
        Self {
            simulator,
            paused: true,
            scenario_name,
            logs: None,
            tick_scroll: 0,
        }
    }

    /// Show captured tracing output in a log pane.
    pub fn with_logs(mut self, logs: MemoryLogBuffer) -> Self {
        self.logs = Some(logs);
        self
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let tick_rate = Duration::from_millis(50);
        let mut last_tick = Instant::now();

        loop {
            terminal.draw(|f| self.ui(f))?;

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_secs(0));

            if crossterm::event::poll(timeout)?
                && let Event::Key(key) = event::read()?
            {
                match key.code {
                    KeyCode::Char('q') => break,
                    KeyCode::Char(' ') => self.paused = !self.paused,
                    KeyCode::Char('s') => {
                        self.simulator.step();
                    }
                    KeyCode::Char('f') => {
                        while self.simulator.step() {}
                    }
                    KeyCode::Up => {
                        self.tick_scroll = self.tick_scroll.saturating_add(1);
                    }
                    KeyCode::Down => {
                        self.tick_scroll = self.tick_scroll.saturating_sub(1);
                    }
                    _ => {}
                }
            }

            if last_tick.elapsed() >= tick_rate {
                if !self.paused && !self.simulator.step() {
                    self.paused = true;
                }
                last_tick = Instant::now();
            }
        }

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        Ok(())
    }

    pub fn into_simulator(self) -> Simulator<O> {
        self.simulator
    }

    fn ui(&self, f: &mut Frame) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Control bar
                Constraint::Min(0),    // Chart + dashboard
                Constraint::Length(10), // Recent ticks + logs
            ])
            .split(f.area());

        self.render_control(f, rows[0]);

        let mid = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(rows[1]);
        self.render_window_chart(f, mid[0]);
        self.render_dashboard(f, mid[1]);

        match &self.logs {
            Some(logs) => {
                let bottom = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                    .split(rows[2]);
                self.render_ticks(f, bottom[0]);
                render_logs(f, bottom[1], logs);
            }
            None => self.render_ticks(f, rows[2]),
        }
    }

    fn render_control(&self, f: &mut Frame, area: Rect) {
        let scenario = self.scenario_name.as_deref().unwrap_or("Ad-hoc Simulation");
        let status = if self.simulator.is_finished() {
            "DONE"
        } else if self.paused {
            "PAUSED"
        } else {
            "RUNNING"
        };
        let status_text = format!(
            "Scenario: {} | Time: {:.2}/{:.2} s | Status: {} | (q)uit (space)pause/resume (s)tep (f)inish",
            scenario,
            self.simulator.current_time(),
            self.simulator.config().sim_time,
            status,
        );
        let status_block = Paragraph::new(status_text)
            .block(Block::default().borders(Borders::ALL).title("Control"));
        f.render_widget(status_block, area);
    }

    fn render_dashboard(&self, f: &mut Frame, area: Rect) {
        let cfg = self.simulator.config();
        let state = self.simulator.controller_state();
        let elapsed = self.simulator.current_time();
        let running_rate = if elapsed > 0.0 {
            self.simulator.acked_units() / elapsed
        } else {
            0.0
        };

        let stats_text = vec![
            Line::from(format!("Algorithm:   {}", cfg.algorithm)),
            Line::from(format!("Loss rate:   {}", cfg.loss_rate)),
            Line::from(format!("RTT:         {} s", cfg.rtt)),
            Line::from(format!("Cap:         {}", cfg.cwnd_cap)),
            Line::from(""),
            Line::from(format!("cwnd:        {:.2}", state.cwnd)),
            Line::from(format!("ssthresh:    {:.2}", state.ssthresh)),
            Line::from(format!("Phase:       {:?}", state.phase())),
            Line::from(""),
            Line::from(format!("Ticks:       {}", self.simulator.ticks())),
            Line::from(format!("Segments:    {}", self.simulator.segments_sent)),
            Line::from(format!("Loss events: {}", self.simulator.loss_events)),
            Line::from(format!("Throughput:  {:.3} MSS/s", running_rate)),
        ];

        let block = Paragraph::new(stats_text)
            .block(Block::default().borders(Borders::ALL).title("Dashboard"));
        f.render_widget(block, area);
    }

    fn render_window_chart(&self, f: &mut Frame, area: Rect) {
        let report = self.simulator.export_report();
        if report.trace.is_empty() {
            let block = Paragraph::new("No ticks yet, press space or s")
                .block(Block::default().borders(Borders::ALL).title("Window"));
            f.render_widget(block, area);
            return;
        }

        let cwnd_pts = report.step_series(|s| s.cwnd);
        let ssthresh_pts = report.step_series(|s| s.ssthresh);

        let y_max = cwnd_pts
            .iter()
            .chain(ssthresh_pts.iter())
            .map(|(_, y)| *y)
            .fold(1.0_f64, f64::max);
        let x_max = report.end_time.max(report.config.rtt);

        let datasets = vec![
            Dataset::default()
                .name("cwnd")
                .marker(symbols::Marker::Braille)
                .style(Style::default().fg(Color::Cyan))
                .graph_type(GraphType::Line)
                .data(&cwnd_pts),
            Dataset::default()
                .name("ssthresh")
                .marker(symbols::Marker::Braille)
                .style(
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::DIM),
                )
                .graph_type(GraphType::Line)
                .data(&ssthresh_pts),
        ];

        let x_labels = vec![
            Span::raw("0"),
            Span::raw(format!("{:.1}", x_max / 2.0)),
            Span::raw(format!("{:.1}", x_max)),
        ];
        let y_labels = vec![
            Span::raw("0"),
            Span::raw(format!("{:.0}", y_max / 2.0)),
            Span::raw(format!("{:.0}", y_max)),
        ];

        let chart = Chart::new(datasets)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(report.title()),
            )
            .x_axis(
                Axis::default()
                    .title("Time (s)")
                    .bounds([0.0, x_max])
                    .labels(x_labels),
            )
            .y_axis(
                Axis::default()
                    .title("cwnd (MSS)")
                    .bounds([0.0, y_max])
                    .labels(y_labels),
            );

        f.render_widget(chart, area);
    }

    fn render_ticks(&self, f: &mut Frame, area: Rect) {
        let trace = &self.simulator.trace;
        let outcomes = &self.simulator.outcomes;
        if trace.is_empty() {
            let block = Paragraph::new("No ticks yet")
                .block(Block::default().borders(Borders::ALL).title("Ticks"));
            f.render_widget(block, area);
            return;
        }

        let height = area.height.max(3) as usize;
        let visible = height - 2;
        let total = trace.len();
        let scroll = self.tick_scroll.min(total.saturating_sub(visible));
        let start = total.saturating_sub(visible + scroll);
        let end = total.saturating_sub(scroll).max(start);

        let items: Vec<ListItem> = trace[start..end]
            .iter()
            .zip(&outcomes[start..end])
            .map(|(sample, outcome)| {
                let text = format!(
                    "[{:>8.3} s] cwnd={:<8.2} ssthresh={:<8.2} sent={} acked={}{}",
                    sample.time,
                    sample.cwnd,
                    sample.ssthresh,
                    outcome.segment_count,
                    outcome.acknowledged_count,
                    if outcome.loss_detected { " LOSS" } else { "" }
                );
                let style = if outcome.loss_detected {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default().fg(Color::White)
                };
                ListItem::new(Line::from(Span::styled(text, style)))
            })
            .collect();

        let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Ticks"));
        f.render_widget(list, area);
    }
}

fn render_logs(f: &mut Frame, area: Rect, logs: &MemoryLogBuffer) {
    let visible = area.height.saturating_sub(2) as usize;
    let items: Vec<ListItem> = logs
        .tail(visible)
        .into_iter()
        .map(|line| {
            let style = if line.contains("WARN") || line.contains("ERROR") {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::Gray)
            };
            ListItem::new(Line::from(Span::styled(line, style)))
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Logs"));
    f.render_widget(list, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn log_buffer_keeps_trimmed_lines() {
        let mut buffer = MemoryLogBuffer::new();
        buffer.write_all(b"  hello world\n").unwrap();
        assert_eq!(buffer.lines(), vec!["hello world".to_string()]);
    }

    #[test]
    fn log_buffer_is_bounded() {
        let buffer = MemoryLogBuffer::new();
        for i in 0..(MAX_LOG_LINES + 5) {
            buffer.push(i.to_string());
        }
        let lines = buffer.lines();
        assert_eq!(lines.len(), MAX_LOG_LINES);
        assert_eq!(lines[0], "5");
    }

    #[test]
    fn log_tail_returns_newest_lines() {
        let buffer = MemoryLogBuffer::new();
        assert!(buffer.tail(3).is_empty());
        for line in ["a", "b", "c", "d"] {
            buffer.push(line.to_string());
        }
        assert_eq!(buffer.tail(2), vec!["c".to_string(), "d".to_string()]);
        assert_eq!(buffer.tail(10).len(), 4);
        assert!(buffer.tail(0).is_empty());
    }
}
