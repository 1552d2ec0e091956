//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::cpu::{CpuState, Register};
use crate::cpu::cache::CACHE_LINES;
use super::app::DebuggerApp;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Percentage(45),
        ])
        .split(frame.area());

    // Left side: source, microcode and status
    let mut left = vec![Constraint::Min(8)];
    if app.show_microcode {
        left.push(Constraint::Length(9));
    }
    left.push(Constraint::Length(3));
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(left)
        .split(chunks[0]);

    draw_source(frame, left_chunks[0], app);
    if app.show_microcode {
        draw_microcode(frame, left_chunks[1], app);
    }
    draw_status(frame, left_chunks[left_chunks.len() - 1], app);

    // Right side: registers, cache, memory and help
    let mut right = vec![Constraint::Length(9)];
    if app.show_cache {
        right.push(Constraint::Length(CACHE_LINES as u16 + 3));
    }
    right.push(Constraint::Min(6));
    right.push(Constraint::Length(4));
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(right)
        .split(chunks[1]);

    draw_registers(frame, right_chunks[0], app);
    let mut next = 1;
    if app.show_cache {
        draw_cache(frame, right_chunks[next], app);
        next += 1;
    }
    draw_memory(frame, right_chunks[next], app);
    draw_help(frame, right_chunks[next + 1]);
}

/// Draw the program source with the executing line highlighted.
fn draw_source(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let window = app.source_window((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = window
        .iter()
        .map(|&(line, text, is_current)| {
            let prefix = if is_current { "▶ " } else { "  " };
            let bp = if app.line_has_breakpoint(line) { "●" } else { " " };

            let style = if is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.line_has_breakpoint(line) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}{:4} {}", bp, prefix, line, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Source ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw the control store around MPC.
fn draw_microcode(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let window = app.microcode_window((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = window
        .into_iter()
        .map(|(addr, text, is_current)| {
            let style = if is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            let prefix = if is_current { "▶" } else { " " };
            ListItem::new(format!("{}{:3}: {}", prefix, addr, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Microcode ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)));

    frame.render_widget(list, area);
}

fn register_span(reg: Register, app: &DebuggerApp) -> Vec<Span<'static>> {
    vec![
        Span::raw(format!("{:>4}: ", reg.name().to_uppercase())),
        Span::styled(format!("{:04X}", app.cpu.register(reg).to_u16()), Style::default().fg(Color::White)),
        Span::raw("  "),
    ]
}

/// Draw datapath registers, flags and counters.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let cpu = &app.cpu;
    let row = |regs: &[Register]| -> Line<'static> {
        Line::from(regs.iter().flat_map(|&r| register_span(r, app)).collect::<Vec<_>>())
    };

    let flag_style = |set: bool| {
        if set {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };

    let state_style = match cpu.state() {
        CpuState::Running => Style::default().fg(Color::Green),
        CpuState::Idle => Style::default().fg(Color::Yellow),
        CpuState::Halted => Style::default().fg(Color::Red),
    };

    let content = vec![
        row(&[Register::Pc, Register::Ac, Register::Sp]),
        row(&[Register::Ir, Register::Tir]),
        row(&[Register::A, Register::B, Register::C]),
        row(&[Register::D, Register::E, Register::F]),
        Line::from(vec![
            Span::raw(" MAR: "),
            Span::styled(format!("{:03X}", cpu.mar()), Style::default().fg(Color::White)),
            Span::raw("   MBR: "),
            Span::styled(format!("{:04X}", cpu.mbr().to_u16()), Style::default().fg(Color::White)),
            Span::raw("   MPC: "),
            Span::styled(format!("{}", cpu.mpc()), Style::default().fg(Color::Yellow)),
        ]),
        Line::from(vec![
            Span::raw("   N: "),
            Span::styled(if cpu.flag_n() { "1" } else { "0" }, flag_style(cpu.flag_n())),
            Span::raw("   Z: "),
            Span::styled(if cpu.flag_z() { "1" } else { "0" }, flag_style(cpu.flag_z())),
            Span::raw("   State: "),
            Span::styled(format!("{:?}", cpu.state()), state_style),
        ]),
        Line::from(vec![
            Span::raw("Cycles: "),
            Span::styled(format!("{}", cpu.cycle_count()), Style::default().fg(Color::Cyan)),
            Span::raw("   Instructions: "),
            Span::styled(format!("{}", cpu.clock_count()), Style::default().fg(Color::Cyan)),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw cache lines and statistics.
fn draw_cache(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let stats = app.cpu.cache_stats();
    let mut items: Vec<ListItem> = app
        .cpu
        .cache_lines()
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let data: Vec<String> = line.data.iter().map(|w| format!("{:04X}", w.to_u16())).collect();
            let text = format!("{}  {}  tag {:02X}  {}", i, if line.valid { "V" } else { "-" }, line.tag, data.join(" "));
            let style = if line.valid {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            ListItem::new(text).style(style)
        })
        .collect();
    items.push(ListItem::new(format!(
        "hits {}  misses {}  rate {:.1}%",
        stats.hits,
        stats.misses,
        stats.hit_rate() * 100.0
    )).style(Style::default().fg(Color::Cyan)));

    let list = List::new(items)
        .block(Block::default()
            .title(" Cache ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)));

    frame.render_widget(list, area);
}

/// Draw memory view.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let pc = app.cpu.pc().to_u16() as usize;
    let sp = app.cpu.sp().to_u16() as usize;
    let mar = app.cpu.mar() as usize;

    let items: Vec<ListItem> = app
        .memory_window(visible_rows)
        .into_iter()
        .map(|(addr, value)| {
            let marker = if addr == pc {
                "PC"
            } else if addr == sp {
                "SP"
            } else if addr == mar {
                "MA"
            } else {
                "  "
            };
            let text = format!("{} {:03X}: {}", marker, addr, app.mem_format.format(value));

            let style = if addr == pc {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if addr == sp || addr == mar {
                Style::default().fg(Color::Cyan)
            } else if !value.is_zero() {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            ListItem::new(text).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(format!(" Memory ({}) ", app.mem_format.name()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Micro-step  i: Instruction  r: Run  p: Pause  b: Breakpoint"),
        Line::from("x: Reset  m: Reload microcode  c/u: Panels  f: Format  ↑↓: Scroll  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}
