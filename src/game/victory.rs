use super::model::{GameState, Role, Winner};

/// Alive head-count per side. Bodyguards count with the civilians; Jesters only count toward
/// the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AliveCounts {
    total: usize,
    civilians: usize,
    undercover: usize,
    mr_white: usize,
}

impl AliveCounts {
    fn of(state: &GameState) -> Self {
        Self {
            total: state.alive_count(),
            civilians: state.alive_with_role(Role::Civilian)
                + state.alive_with_role(Role::Bodyguard),
            undercover: state.alive_with_role(Role::Undercover),
            mr_white: state.alive_with_role(Role::MrWhite),
        }
    }
}

/// Ordered victory check; the first rule that matches decides.
///
/// 1. a correct Mr. White guess wins outright
/// 2. Mr. White among the last two standing
/// 3. no undercover and no Mr. White alive: civilians
/// 4. no civilians alive: undercover
/// 5. undercover >= civilians + Mr. White: undercover
/// 6. no Mr. White and undercover >= civilians: undercover
pub fn evaluate(state: &GameState, instant_win: bool) -> Option<Winner> {
    if instant_win {
        return Some(Winner::MrWhite);
    }

    let alive = AliveCounts::of(state);

    if alive.mr_white >= 1 && alive.total <= 2 {
        return Some(Winner::MrWhite);
    }
    if alive.undercover == 0 && alive.mr_white == 0 {
        return Some(Winner::Civilians);
    }
    if alive.civilians == 0 {
        return Some(Winner::Undercover);
    }
    if alive.undercover >= alive.civilians + alive.mr_white {
        return Some(Winner::Undercover);
    }
    if alive.mr_white == 0 && alive.undercover >= alive.civilians {
        return Some(Winner::Undercover);
    }
    None
}

/// Victory check right after `eliminated` left the game. A Jester going out wins unless a
/// correct Mr. White guess already took the game.
pub fn evaluate_elimination(
    state: &GameState,
    eliminated: Option<Role>,
    instant_win: bool,
) -> Option<Winner> {
    if instant_win {
        return Some(Winner::MrWhite);
    }
    if eliminated == Some(Role::Jester) {
        return Some(Winner::Jester);
    }
    evaluate(state, false)
}
