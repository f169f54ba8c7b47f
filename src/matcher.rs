//! Maps saved descriptors of one application onto its live windows.
//!
//! Four passes, each only considering what earlier passes left unclaimed:
//! same handle, same title, nearest frame within tolerance, then anything.
//! The result is a partial bijection; descriptors left without a window are
//! the slots the orchestrator has to create.

use tracing::trace;

use crate::{
    geometry::DisplayInfo,
    host::LiveWindow,
    workspace::{WindowDescriptor, WindowId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPass {
    Handle,
    Title,
    Proximity,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub window: WindowId,
    pub pass: MatchPass,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    /// Indexed like the saved descriptors.
    pub bindings: Vec<Option<Binding>>,
}

impl MatchOutcome {
    pub fn window_for(&self, index: usize) -> Option<WindowId> {
        self.bindings.get(index).copied().flatten().map(|b| b.window)
    }

    pub fn pairs(&self) -> impl Iterator<Item = (usize, WindowId)> + '_ {
        self.bindings
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.map(|b| (i, b.window)))
    }

    /// Saved indices that found no live window.
    pub fn needs_creation(&self) -> Vec<usize> {
        self.bindings
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_none())
            .map(|(i, _)| i)
            .collect()
    }
}

pub struct WindowMatcher<'a> {
    display: &'a DisplayInfo,
    tolerance: f64,
}

impl<'a> WindowMatcher<'a> {
    pub fn new(display: &'a DisplayInfo, tolerance: f64) -> Self {
        Self { display, tolerance }
    }

    pub fn match_windows(&self, saved: &[&WindowDescriptor], live: &[LiveWindow]) -> MatchOutcome {
        let mut state = Claims {
            bindings: vec![None; saved.len()],
            claimed: vec![false; live.len()],
        };

        for (si, desc) in saved.iter().enumerate() {
            let Some(handle) = desc.window_id else {
                continue;
            };
            let found = state.free(live).find(|&li| live[li].id == handle);
            if let Some(li) = found {
                state.bind(live, si, li, MatchPass::Handle);
            }
        }

        for (si, desc) in saved.iter().enumerate() {
            if state.bindings[si].is_some() || desc.title.is_empty() {
                continue;
            }
            let found = state.free(live).find(|&li| live[li].title == desc.title);
            if let Some(li) = found {
                state.bind(live, si, li, MatchPass::Title);
            }
        }

        for (si, desc) in saved.iter().enumerate() {
            if state.bindings[si].is_some() {
                continue;
            }
            let target = self.display.absolute(&desc.frame);
            let nearest = state
                .free(live)
                .filter(|&li| live[li].frame.within(&target, self.tolerance))
                .min_by(|&a, &b| {
                    live[a]
                        .frame
                        .city_block(&target)
                        .total_cmp(&live[b].frame.city_block(&target))
                });
            if let Some(li) = nearest {
                state.bind(live, si, li, MatchPass::Proximity);
            }
        }

        for si in 0..saved.len() {
            if state.bindings[si].is_some() {
                continue;
            }
            let found = state.free(live).next();
            match found {
                Some(li) => state.bind(live, si, li, MatchPass::Fallback),
                None => break,
            }
        }

        MatchOutcome {
            bindings: state.bindings,
        }
    }
}

struct Claims {
    bindings: Vec<Option<Binding>>,
    claimed: Vec<bool>,
}

impl Claims {
    fn free<'l>(&'l self, live: &'l [LiveWindow]) -> impl Iterator<Item = usize> + 'l {
        (0..live.len()).filter(move |&li| !self.claimed[li])
    }

    fn bind(&mut self, live: &[LiveWindow], saved: usize, li: usize, pass: MatchPass) {
        self.claimed[li] = true;
        self.bindings[saved] = Some(Binding {
            window: live[li].id,
            pass,
        });
        trace!(saved, window = live[li].id, ?pass, "window bound");
    }
}
