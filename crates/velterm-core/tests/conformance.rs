//! End-to-end conformance scenarios: raw byte streams in, screen state out.
//!
//! Each fixture drives a fresh parser + screen buffer pair exactly the way
//! the terminal's output path does, then checks cells, colors, cursor, and
//! scrollback against expectations.

use serde::Deserialize;
use velterm_core::{Palette, Parser, Rgba, ScreenBuffer, WidthPolicy};

fn screen(cols: u16, rows: u16, scrollback: usize) -> ScreenBuffer {
    ScreenBuffer::new(cols, rows, scrollback, Palette::default(), WidthPolicy::Standard)
}

fn feed(sb: &mut ScreenBuffer, parser: &mut Parser, bytes: &[u8]) {
    for action in parser.feed(bytes) {
        sb.apply_action(&action);
    }
}

fn run(sb: &mut ScreenBuffer, bytes: &[u8]) {
    let mut parser = Parser::new();
    feed(sb, &mut parser, bytes);
}

// ── JSON fixtures ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Fixture {
    name: String,
    size: [u16; 2],
    input_hex: String,
    cursor: [u16; 2],
    cells: Vec<CellExpectation>,
}

#[derive(Debug, Deserialize)]
struct CellExpectation {
    col: u16,
    row: u16,
    #[serde(rename = "char")]
    ch: String,
    #[serde(default)]
    fg: Option<[u8; 3]>,
}

fn decode_hex(hex: &str) -> Vec<u8> {
    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            let s = std::str::from_utf8(pair).expect("hex fixture");
            u8::from_str_radix(s, 16).expect("hex fixture")
        })
        .collect()
}

#[test]
fn cell_fixtures() {
    let fixtures: Vec<Fixture> = serde_json::from_str(include_str!("fixtures/cells.json"))
        .expect("fixtures/cells.json parses");
    assert!(!fixtures.is_empty());

    for fixture in fixtures {
        let mut sb = screen(fixture.size[0], fixture.size[1], 100);
        run(&mut sb, &decode_hex(&fixture.input_hex));

        let cursor = sb.cursor();
        assert_eq!(
            [cursor.col, cursor.row],
            fixture.cursor,
            "{}: cursor mismatch",
            fixture.name
        );
        for expect in &fixture.cells {
            let cell = sb
                .cell(expect.row, expect.col)
                .unwrap_or_else(|| panic!("{}: cell out of range", fixture.name));
            let expected_ch = expect.ch.chars().next().expect("fixture char");
            assert_eq!(
                cell.ch, expected_ch,
                "{}: char at ({}, {})",
                fixture.name, expect.col, expect.row
            );
            if let Some([r, g, b]) = expect.fg {
                assert_eq!(
                    cell.fg,
                    Rgba::new(r, g, b),
                    "{}: fg at ({}, {})",
                    fixture.name,
                    expect.col,
                    expect.row
                );
            }
        }
    }
}

// ── Scenario: SGR coloring (ab <red> cd <reset> ef) ─────────────────

#[test]
fn sgr_color_run_in_single_row() {
    let mut sb = screen(80, 1, 0);
    run(&mut sb, b"ab\x1b[31mcd\x1b[0mef");

    for (col, ch) in "abcdef".chars().enumerate() {
        assert_eq!(sb.cell(0, col as u16).unwrap().ch, ch);
    }
    let (default_fg, _) = sb.default_colors();
    let red = Palette::default().indexed(1);
    for col in [2u16, 3] {
        assert_eq!(sb.cell(0, col).unwrap().fg, red, "col {col} should be red");
    }
    for col in [0u16, 1, 4, 5] {
        assert_eq!(
            sb.cell(0, col).unwrap().fg,
            default_fg,
            "col {col} should be default"
        );
    }
}

// ── Scenario: repeated lines fill scrollback ────────────────────────

#[test]
fn repeated_lines_flow_into_scrollback() {
    let mut sb = screen(10, 3, 100);
    for _ in 0..10 {
        run(&mut sb, b"hello\r\n");
    }

    // Ten written lines plus the cursor row occupy 11 rows; three are live,
    // so eight "hello" rows have scrolled off the top.
    assert_eq!(sb.scrollback_len(), 8);
    for abs_row in 0..8 {
        let text: String = (0..5)
            .map(|col| sb.at_absolute(col, abs_row).map(|c| c.ch).unwrap_or(' '))
            .collect();
        assert_eq!(text, "hello", "scrollback row {abs_row}");
    }
    assert_eq!(sb.row_text(0), "hello");
    assert_eq!(sb.row_text(1), "hello");
    assert_eq!(sb.row_text(2), "");
    assert_eq!((sb.cursor().col, sb.cursor().row), (0, 2));
}

/// Property: with the alternate screen inactive, wrapping the cursor past
/// the bottom `n` times grows scrollback by exactly `n`, and no content is
/// lost.
#[test]
fn scrollback_conservation() {
    for n in [1usize, 5, 20, 99] {
        let mut sb = screen(8, 4, 100);
        // Fill all four rows, then force `n` further wraps.
        run(&mut sb, b"r0\r\nr1\r\nr2\r\nr3");
        for i in 0..n {
            run(&mut sb, format!("\r\nw{i}").as_bytes());
        }
        assert_eq!(sb.scrollback_len(), n, "n = {n}");
        // The oldest rows are intact.
        let text: String = (0..2)
            .map(|col| sb.at_absolute(col, 0).map(|c| c.ch).unwrap_or(' '))
            .collect();
        assert_eq!(text, "r0");
    }
}

// ── Scenario: alternate screen round-trip ───────────────────────────

#[test]
fn alt_screen_round_trip_restores_main_exactly() {
    let mut sb = screen(20, 4, 100);
    run(&mut sb, b"one\r\ntwo\r\nthree\r\nfour\r\nfive");
    let main_text = sb.screen_text();
    let scrollback_before = sb.scrollback_len();
    let cursor_before = (sb.cursor().col, sb.cursor().row);

    run(&mut sb, b"\x1b[?1049h\x1b[2J");
    assert_eq!(sb.screen_text(), "\n\n\n", "alt screen starts clear");
    run(&mut sb, b"alt");
    assert_eq!(sb.row_text(0), "alt");

    run(&mut sb, b"\x1b[?1049l");
    assert_eq!(sb.screen_text(), main_text, "main screen restored exactly");
    assert_eq!(sb.scrollback_len(), scrollback_before);
    assert_eq!((sb.cursor().col, sb.cursor().row), cursor_before);
}

/// Property: arbitrary writes in the alternate screen leave the main
/// screen and scrollback bit-for-bit intact.
#[test]
fn alt_screen_isolation_under_arbitrary_writes() {
    let mut sb = screen(12, 3, 50);
    run(&mut sb, b"aaa\r\nbbb\r\nccc\r\nddd");
    let main_cells: Vec<_> = (0..sb.total_rows())
        .map(|row| {
            (0..12)
                .map(|col| sb.at_absolute(col, row).copied())
                .collect::<Vec<_>>()
        })
        .collect();

    run(&mut sb, b"\x1b[?1049h");
    run(&mut sb, b"\x1b[31mjunk\x1b[2J\x1b[5;1Hmore\r\n\r\n\r\n\x1b[Lx\x1b[0m");
    run(&mut sb, b"\x1b[?1049l");

    let after: Vec<_> = (0..sb.total_rows())
        .map(|row| {
            (0..12)
                .map(|col| sb.at_absolute(col, row).copied())
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(main_cells, after);
}

// ── Scenario: resize keeps scrollback and relative cursor ───────────

#[test]
fn resize_preserves_scrollback() {
    let mut sb = screen(10, 3, 100);
    for i in 0..6 {
        run(&mut sb, format!("line{i}\r\n").as_bytes());
    }
    let scrollback_before = sb.scrollback_len();
    sb.resize(6, 2);
    assert_eq!(sb.scrollback_len(), scrollback_before);
    let text: String = (0..5)
        .map(|col| sb.at_absolute(col, 0).map(|c| c.ch).unwrap_or(' '))
        .collect();
    assert_eq!(text, "line0");
}

// ── Scenario: tabs land on 8-column stops ───────────────────────────

#[test]
fn tabs_advance_to_default_stops() {
    let mut sb = screen(20, 1, 0);
    run(&mut sb, b"a\tb\tc");
    assert_eq!(sb.cell(0, 0).unwrap().ch, 'a');
    assert_eq!(sb.cell(0, 8).unwrap().ch, 'b');
    assert_eq!(sb.cell(0, 16).unwrap().ch, 'c');
}
