//! Z-order and activation planning
//!
//! Given every registered overlay's current stacking state, compute the new
//! z-index and activation role of each visible overlay once `target` is
//! brought to the front. Planning is pure; the manager applies the result.

use super::config::ZIndexBands;

/// Stacking state of one registered overlay
#[derive(Debug, Clone, PartialEq)]
pub struct StackEntry {
    pub name: String,
    pub z_index: i64,
    pub visible: bool,
    pub modal: bool,
    pub force_foreground: bool,
    pub auto_close: bool,
    pub sub_overlay: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Active and receiving input
    Front,
    /// Active because a sub-overlay in front of it is
    Parent,
    /// Inactive; dimmed when `modal`
    Inactive { modal: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub name: String,
    pub z_index: i64,
    pub role: Role,
}

/// Plan activation of `target`
///
/// Visible overlays are ordered by descending prior z-index with `target`
/// forced first, then walked top-down. Bands are assigned with a counter that
/// decreases per visible overlay; forced-foreground overlays pin the top band.
/// The first overlay becomes front; each overlay directly below a
/// sub-overlay chain stays active as its parent.
pub fn plan_activation(target: &str, entries: &[StackEntry], bands: &ZIndexBands) -> Vec<Placement> {
    let mut order: Vec<&StackEntry> = entries.iter().filter(|entry| entry.name != target).collect();
    order.sort_by(|a, b| b.z_index.cmp(&a.z_index));
    if let Some(entry) = entries.iter().find(|entry| entry.name == target) {
        order.insert(0, entry);
    }

    let mut visible_count = order
        .iter()
        .filter(|entry| entry.visible || entry.name == target)
        .count() as i64;
    let mut visible_counter = 0usize;
    let mut sub_counter = 0usize;
    let mut plan = Vec::new();

    for entry in order {
        if !(entry.visible || entry.name == target) {
            continue;
        }

        let z_index = if entry.force_foreground {
            bands.foreground
        } else {
            let base = if entry.auto_close {
                bands.auto_close
            } else if entry.modal {
                bands.modal
            } else {
                bands.default
            };
            let z = base + visible_count;
            visible_count -= 1;
            z
        };

        let role = if visible_counter == sub_counter {
            if sub_counter == 0 { Role::Front } else { Role::Parent }
        } else {
            Role::Inactive { modal: entry.modal }
        };

        plan.push(Placement {
            name: entry.name.clone(),
            z_index,
            role,
        });

        visible_counter += 1;
        if entry.sub_overlay {
            sub_counter += 1;
        }
    }

    plan
}

/// Name of the visible overlay with the highest z-index
///
/// Ties keep the earliest registered overlay.
pub fn top_visible(entries: &[StackEntry]) -> Option<&str> {
    let mut top: Option<&StackEntry> = None;
    for entry in entries.iter().filter(|entry| entry.visible) {
        if top.is_none_or(|current| entry.z_index > current.z_index) {
            top = Some(entry);
        }
    }
    top.map(|entry| entry.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(name: &str, z_index: i64, visible: bool) -> StackEntry {
        StackEntry {
            name: name.to_string(),
            z_index,
            visible,
            modal: false,
            force_foreground: false,
            auto_close: false,
            sub_overlay: false,
        }
    }

    #[test]
    fn test_target_becomes_front() {
        let entries = vec![entry("a", 12, true), entry("b", 11, true), entry("c", 0, false)];
        let plan = plan_activation("b", &entries, &ZIndexBands::default());

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0], Placement { name: "b".into(), z_index: 12, role: Role::Front });
        assert_eq!(
            plan[1],
            Placement { name: "a".into(), z_index: 11, role: Role::Inactive { modal: false } }
        );
    }

    #[test]
    fn test_bands_separate_kinds() {
        let mut modal = entry("modal", 0, true);
        modal.modal = true;
        let mut menu = entry("menu", 0, true);
        menu.auto_close = true;
        let mut wait = entry("wait", 0, true);
        wait.force_foreground = true;
        let entries = vec![entry("plain", 0, true), modal, menu, wait];

        let plan = plan_activation("plain", &entries, &ZIndexBands::default());
        let z = |name: &str| plan.iter().find(|p| p.name == name).unwrap().z_index;
        assert_eq!(z("wait"), 3000);
        assert!(z("menu") > 2000 && z("menu") < 3000);
        assert!(z("modal") > 1000 && z("modal") < 2000);
        assert!(z("plain") > 10 && z("plain") < 1000);
    }

    #[test]
    fn test_sub_overlay_keeps_parent_active() {
        let mut menu = entry("menu", 0, true);
        menu.sub_overlay = true;
        let entries = vec![entry("parent", 20, true), menu, entry("other", 5, true)];

        let plan = plan_activation("menu", &entries, &ZIndexBands::default());
        assert_eq!(plan[0].role, Role::Front);
        assert_eq!(plan[1].name, "parent");
        assert_eq!(plan[1].role, Role::Parent);
        assert_eq!(plan[2].role, Role::Inactive { modal: false });
    }

    #[test]
    fn test_inactive_modal_is_dimmed() {
        let mut dialog = entry("dialog", 1003, true);
        dialog.modal = true;
        let entries = vec![dialog, entry("top", 0, true)];

        let plan = plan_activation("top", &entries, &ZIndexBands::default());
        assert_eq!(plan[1].role, Role::Inactive { modal: true });
    }

    #[test]
    fn test_top_visible() {
        let entries = vec![entry("a", 5, true), entry("b", 9, false), entry("c", 7, true), entry("d", 7, true)];
        assert_eq!(top_visible(&entries), Some("c"));
        assert_eq!(top_visible(&[entry("a", 5, false)]), None);
        assert_eq!(top_visible(&[]), None);
    }

    fn arb_entries() -> impl Strategy<Value = Vec<StackEntry>> {
        prop::collection::vec(
            (0i64..50, any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()),
            1..8,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (z_index, visible, modal, auto_close, sub_overlay))| StackEntry {
                    name: format!("o{i}"),
                    z_index,
                    visible,
                    modal,
                    force_foreground: false,
                    auto_close,
                    sub_overlay,
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_exactly_one_front(entries in arb_entries(), pick in any::<prop::sample::Index>()) {
            let target = entries[pick.index(entries.len())].name.clone();
            let plan = plan_activation(&target, &entries, &ZIndexBands::default());

            prop_assert_eq!(plan.iter().filter(|p| p.role == Role::Front).count(), 1);
            prop_assert_eq!(&plan[0].name, &target);
            prop_assert_eq!(plan[0].role, Role::Front);
        }

        #[test]
        fn prop_z_strictly_decreases_within_band(entries in arb_entries(), pick in any::<prop::sample::Index>()) {
            let target = entries[pick.index(entries.len())].name.clone();
            let bands = ZIndexBands::default();
            let plan = plan_activation(&target, &entries, &bands);

            let band_of = |z: i64| if z >= bands.auto_close { 2 } else if z >= bands.modal { 1 } else { 0 };
            for pair in plan.windows(2) {
                if band_of(pair[0].z_index) == band_of(pair[1].z_index) {
                    prop_assert!(pair[0].z_index > pair[1].z_index);
                }
            }
        }

        #[test]
        fn prop_hidden_overlays_are_untouched(entries in arb_entries(), pick in any::<prop::sample::Index>()) {
            let target = entries[pick.index(entries.len())].name.clone();
            let plan = plan_activation(&target, &entries, &ZIndexBands::default());

            for entry in entries.iter().filter(|e| !e.visible && e.name != target) {
                prop_assert!(plan.iter().all(|p| p.name != entry.name));
            }
        }
    }
}
