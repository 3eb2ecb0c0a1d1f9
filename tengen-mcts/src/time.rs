//! Wall-clock budgeting: main time, byo-yomi bookkeeping and the per-move
//! time allowance the stop controller works against.
//!
//! All durations are centiseconds, the protocol's native unit.

use std::fmt;
use std::time::Instant;

use tengen_core::Color;

/// "Effectively unlimited" per-move budget: one month.
const ONE_MONTH_CENTIS: i32 = 31 * 24 * 60 * 60 * 100;

/// Game clock for both players.
///
/// Supports absolute time, Canadian byo-yomi (`byo_stones` moves per
/// `byo_time`) and Japanese byo-yomi (`byo_periods` periods of `byo_time`).
#[derive(Debug, Clone)]
pub struct TimeControl {
    main_time: i32,
    byo_time: i32,
    byo_stones: i32,
    byo_periods: i32,

    remaining_time: [i32; 2],
    stones_left: [i32; 2],
    periods_left: [i32; 2],
    in_byo: [bool; 2],
    times: [Option<Instant>; 2],
}

impl TimeControl {
    /// All arguments in centiseconds (stones and periods are counts).
    pub fn new(main_time: i32, byo_time: i32, byo_stones: i32, byo_periods: i32) -> Self {
        let mut tc = Self {
            main_time,
            byo_time,
            byo_stones,
            byo_periods,
            remaining_time: [0; 2],
            stones_left: [0; 2],
            periods_left: [0; 2],
            in_byo: [false; 2],
            times: [None; 2],
        };
        tc.reset_clocks();
        tc
    }

    /// A clock that never constrains the search.
    pub fn infinite() -> Self {
        Self::new(0, 100, 0, 0)
    }

    pub fn reset_clocks(&mut self) {
        self.remaining_time = [self.main_time; 2];
        self.stones_left = [self.byo_stones; 2];
        self.periods_left = [self.byo_periods; 2];
        self.in_byo = [self.main_time <= 0; 2];
        // Now that byo-yomi status is set, fill the clocks back up.
        for color in 0..2 {
            if self.in_byo[color] {
                self.remaining_time[color] = self.byo_time;
            }
        }
    }

    pub fn start(&mut self, color: Color) {
        self.times[color.index()] = Some(Instant::now());
    }

    pub fn stop(&mut self, color: Color) {
        let idx = color.index();
        let elapsed_centis = self.times[idx]
            .take()
            .map(|start| (start.elapsed().as_millis() / 10) as i32)
            .unwrap_or(0);

        self.remaining_time[idx] -= elapsed_centis;

        if self.in_byo[idx] {
            if self.byo_stones > 0 {
                self.stones_left[idx] -= 1;
            } else if self.byo_periods > 0 && elapsed_centis > self.byo_time {
                self.periods_left[idx] -= 1;
            }
        }

        if !self.in_byo[idx] && self.remaining_time[idx] <= 0 {
            // Time up: entering byo-yomi.
            self.remaining_time[idx] = self.byo_time;
            self.stones_left[idx] = self.byo_stones;
            self.periods_left[idx] = self.byo_periods;
            self.in_byo[idx] = true;
        } else if self.in_byo[idx] && self.byo_stones > 0 && self.stones_left[idx] <= 0 {
            // Completed a Canadian period: reset time and stones.
            self.remaining_time[idx] = self.byo_time;
            self.stones_left[idx] = self.byo_stones;
        } else if self.in_byo[idx] && self.byo_periods > 0 {
            self.remaining_time[idx] = self.byo_time;
        }
    }

    /// External clock sync (e.g. the host's `time_left`). `0 0` means the
    /// main time just ran out.
    pub fn adjust_time(&mut self, color: Color, time: i32, stones: i32) {
        let idx = color.index();
        self.remaining_time[idx] = time;
        if time == 0 && stones == 0 {
            self.in_byo[idx] = true;
            self.remaining_time[idx] = self.byo_time;
            self.stones_left[idx] = self.byo_stones;
            self.periods_left[idx] = self.byo_periods;
        }
        if stones != 0 {
            // Stones are only given in byo-yomi.
            self.in_byo[idx] = true;
        }
        if self.in_byo[idx] {
            if self.byo_stones > 0 {
                self.stones_left[idx] = stones;
            } else if self.byo_periods > 0 {
                self.periods_left[idx] = stones;
            }
        }
    }

    /// Expected number of opening moves for this board size.
    fn opening_moves(&self, boardsize: usize) -> usize {
        let num_intersections = boardsize * boardsize;
        num_intersections / 6
    }

    /// Expected moves still to play, by board size and game progress.
    fn get_moves_expected(&self, boardsize: usize, movenum: usize, time_managed: bool) -> i32 {
        // With time management on we take early exits, so a bigger base
        // time per move is fine.
        let board_div = if time_managed { 9 } else { 5 };

        // Constant as the game goes on; underestimating is fine.
        let base_remaining = (boardsize * boardsize) / board_div;

        // Don't think too long in the opening.
        let fast_moves = self.opening_moves(boardsize);
        if movenum < fast_moves {
            (base_remaining + fast_moves - movenum) as i32
        } else {
            base_remaining as i32
        }
    }

    /// Centiseconds this move may consume.
    pub fn max_time_for_move(
        &self,
        boardsize: usize,
        color: Color,
        movenum: usize,
        time_managed: bool,
        lagbuffer_cs: i32,
    ) -> i32 {
        let idx = color.index();

        // Default: no byo-yomi (absolute clock).
        let mut time_remaining = self.remaining_time[idx];
        let mut moves_remaining = self.get_moves_expected(boardsize, movenum, time_managed);
        let mut extra_time_per_move = 0;

        if self.byo_time != 0 {
            // No periods or stones set: infinite time.
            if self.byo_stones == 0 && self.byo_periods == 0 {
                return ONE_MONTH_CENTIS;
            }

            if self.in_byo[idx] {
                if self.byo_stones > 0 {
                    moves_remaining = self.stones_left[idx];
                } else {
                    // Just use the byo-yomi period.
                    time_remaining = 0;
                    extra_time_per_move = self.byo_time;
                }
            } else {
                // Byo-yomi time is credit we can count on.
                if self.byo_stones > 0 {
                    let byo_extra = self.byo_time / self.byo_stones;
                    time_remaining = self.remaining_time[idx] + byo_extra;
                    extra_time_per_move = byo_extra;
                } else {
                    let byo_extra = self.byo_time * (self.periods_left[idx] - 1);
                    time_remaining = self.remaining_time[idx] + byo_extra;
                    extra_time_per_move = self.byo_time;
                }
            }
        }

        // Keep a lag margin for network or host hiccups.
        let base_time = (time_remaining - lagbuffer_cs).max(0) / moves_remaining.max(1);
        let inc_time = (extra_time_per_move - lagbuffer_cs).max(0);

        base_time + inc_time
    }

    /// Whether thinking fast now banks time for later moves. Not the case
    /// in Japanese byo-yomi, nor on the last stone of a Canadian period.
    pub fn can_accumulate_time(&self, color: Color) -> bool {
        let idx = color.index();
        if self.in_byo[idx] {
            if self.byo_periods > 0 {
                return false;
            }
            if self.byo_stones > 0 && self.stones_left[idx] == 1 {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for color in [Color::Black, Color::White] {
            let idx = color.index();
            let rem = self.remaining_time[idx] / 100;
            let (hours, rest) = (rem / 3600, rem % 3600);
            write!(f, "{color}: {:02}:{:02}:{:02}", hours, rest / 60, rest % 60)?;
            if self.in_byo[idx] {
                if self.byo_stones > 0 {
                    write!(f, " ({} stones left)", self.stones_left[idx])?;
                } else if self.byo_periods > 0 {
                    write!(
                        f,
                        " ({} period(s) of {}s left)",
                        self.periods_left[idx],
                        self.byo_time / 100
                    )?;
                }
            }
            if color == Color::Black {
                write!(f, ", ")?;
            }
        }
        Ok(())
    }
}
