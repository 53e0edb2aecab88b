//! Editable view of an automation curve.
//!
//! The model is a [`ControlList`]: time-ordered `(when, value)` events for one
//! parameter. An [`AutomationLine`] projects it into view space (x in
//! pixels, y as a 0..=1 fraction of the lane height, 0 at the bottom) and runs
//! the drag state machine that moves points without letting them cross
//! neighbours that stay put.

use std::cmp::Ordering;

use daw_transport::Samplepos;

use crate::time::TimeContext;

/// How a parameter's values map onto the lane height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationKind {
    /// Fader law, with the configured maximum gain at the top.
    Gain,
    /// Pan positions, drawn upside down.
    Pan,
    /// Plugin parameters, linear between lower and upper.
    Plugin,
    /// Integer-valued parameters from 0 to upper, such as MIDI controllers.
    Discrete,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterDescriptor {
    pub kind: AutomationKind,
    pub lower: f64,
    pub upper: f64,
}

impl ParameterDescriptor {
    pub fn gain() -> Self {
        Self {
            kind: AutomationKind::Gain,
            lower: 0.0,
            upper: 2.0,
        }
    }

    pub fn pan() -> Self {
        Self {
            kind: AutomationKind::Pan,
            lower: 0.0,
            upper: 1.0,
        }
    }

    pub fn plugin(lower: f64, upper: f64) -> Self {
        Self {
            kind: AutomationKind::Plugin,
            lower,
            upper,
        }
    }

    pub fn discrete(upper: f64) -> Self {
        Self {
            kind: AutomationKind::Discrete,
            lower: 0.0,
            upper,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlEvent {
    /// Relative to the start of whatever owns the automation.
    pub when: Samplepos,
    pub value: f64,
}

/// Time-ordered automation events for one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlList {
    descriptor: ParameterDescriptor,
    events: Vec<ControlEvent>,
}

impl ControlList {
    pub fn new(descriptor: ParameterDescriptor) -> Self {
        Self {
            descriptor,
            events: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &ParameterDescriptor {
        &self.descriptor
    }

    pub fn events(&self) -> &[ControlEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Insert keeping time order; an event at an existing time goes after it.
    pub fn add(&mut self, when: Samplepos, value: f64) -> usize {
        let at = self.events.partition_point(|e| e.when <= when);
        self.events.insert(at, ControlEvent { when, value });
        at
    }

    pub fn modify(&mut self, index: usize, when: Samplepos, value: f64) {
        if let Some(event) = self.events.get_mut(index) {
            event.when = when;
            event.value = value;
        }
    }

    pub fn erase(&mut self, index: usize) -> Option<ControlEvent> {
        (index < self.events.len()).then(|| self.events.remove(index))
    }

    /// Restore time order after a batch of [`ControlList::modify`] calls.
    pub fn sort(&mut self) {
        self.events.sort_by_key(|e| e.when);
    }
}

/// Fader position (0..=1) for a gain factor, where `max_gain` sits at the top.
pub fn gain_to_slider_position_with_max(gain: f64, max_gain: f64) -> f64 {
    let g = gain * 2.0 / max_gain;
    if g <= 0.0 {
        return 0.0;
    }
    ((6.0 * g.log2() + 192.0) / 198.0).max(0.0).powi(8)
}

pub fn slider_position_to_gain_with_max(position: f64, max_gain: f64) -> f64 {
    if position <= 0.0 {
        return 0.0;
    }
    let g = 2f64.powf((position.sqrt().sqrt().sqrt() * 198.0 - 192.0) / 6.0);
    g * max_gain / 2.0
}

/// A control point as drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    /// Pixels from the line's view origin.
    pub x: f64,
    /// Fraction of the lane height, 0 at the bottom.
    pub y: f64,
    /// Index of the event this point shows.
    pub model_index: usize,
    pub view_index: usize,
    pub can_slide: bool,
    pub selected: bool,
}

/// A run of dragged points with consecutive view indices, and how far it
/// may move before hitting a point that is not being dragged.
#[derive(Debug, Clone)]
struct ContiguousRun {
    points: Vec<usize>,
    before_x: f64,
    after_x: f64,
}

impl ContiguousRun {
    fn clamp_dx(&self, points: &[ControlPoint], dx: f64) -> f64 {
        let edge = if dx > 0.0 { self.points.last() } else { self.points.first() };
        let Some(x) = edge.and_then(|i| points.get(*i)).map(|p| p.x) else {
            return dx;
        };
        let tx = (x + dx).max(self.before_x).min(self.after_x);
        tx - x
    }
}

#[derive(Debug, Clone)]
struct DragState {
    points: Vec<usize>,
    runs: Vec<ContiguousRun>,
    x: f64,
    distance: f64,
    last_fraction: f64,
    had_movement: bool,
}

/// Where a drag motion actually took the pointer, after clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragMotion {
    pub x: f64,
    pub fraction: f64,
    /// First view index moved by pushing, for [`AutomationLine::end_drag`].
    pub push_from: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AutomationLine {
    name: String,
    list: ControlList,
    time: TimeContext,
    max_gain: f64,
    /// Session position of the list's time zero.
    origin: Samplepos,
    /// Model time shown at the view's left edge.
    offset: Samplepos,
    maximum_time: Samplepos,
    terminal_points_can_slide: bool,
    points: Vec<ControlPoint>,
    drag: Option<DragState>,
}

impl AutomationLine {
    pub fn new(name: impl Into<String>, list: ControlList, time: TimeContext, max_gain: f64) -> Self {
        let mut line = Self {
            name: name.into(),
            list,
            time,
            max_gain,
            origin: 0,
            offset: 0,
            maximum_time: Samplepos::MAX,
            terminal_points_can_slide: true,
            points: Vec::new(),
            drag: None,
        };
        line.reset();
        line
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn list(&self) -> &ControlList {
        &self.list
    }

    pub fn points(&self) -> &[ControlPoint] {
        &self.points
    }

    pub fn npoints(&self) -> usize {
        self.points.len()
    }

    pub fn nth(&self, view_index: usize) -> Option<&ControlPoint> {
        self.points.get(view_index)
    }

    pub fn set_origin(&mut self, origin: Samplepos) {
        self.origin = origin;
    }

    pub fn set_offset(&mut self, offset: Samplepos) {
        if self.offset != offset {
            self.offset = offset;
            self.reset();
        }
    }

    /// Points at or after `t` (relative to the origin) are not shown.
    pub fn set_maximum_time(&mut self, t: Samplepos) {
        if self.maximum_time != t {
            self.maximum_time = t;
            self.reset();
        }
    }

    /// Region gain lines pin their first and last points in time.
    pub fn set_terminal_points_can_slide(&mut self, yn: bool) {
        if self.terminal_points_can_slide != yn {
            self.terminal_points_can_slide = yn;
            self.reset();
        }
    }

    pub fn set_time_context(&mut self, time: TimeContext) {
        self.time = time;
        self.reset();
    }

    pub fn model_to_view_y(&self, value: f64) -> f64 {
        let d = self.list.descriptor();
        match d.kind {
            AutomationKind::Gain => gain_to_slider_position_with_max(value, self.max_gain),
            AutomationKind::Pan => 1.0 - value,
            AutomationKind::Plugin => (value - d.lower) / (d.upper - d.lower),
            AutomationKind::Discrete => value / d.upper,
        }
    }

    pub fn view_to_model_y(&self, y: f64) -> f64 {
        let d = self.list.descriptor();
        match d.kind {
            AutomationKind::Gain => slider_position_to_gain_with_max(y, self.max_gain).clamp(0.0, self.max_gain),
            AutomationKind::Pan => 1.0 - y,
            AutomationKind::Plugin => y * (d.upper - d.lower) + d.lower,
            AutomationKind::Discrete => (y * d.upper).round(),
        }
    }

    /// Model `(when, value)` to view `(samples from the view origin, fraction)`.
    pub fn model_to_view_coord(&self, when: Samplepos, value: f64) -> (Samplepos, f64) {
        (when - self.offset, self.model_to_view_y(value))
    }

    pub fn view_to_model_coord(&self, x: Samplepos, y: f64) -> (Samplepos, f64) {
        (x + self.offset, self.view_to_model_y(y))
    }

    /// Rebuild the view points from the model.
    pub fn reset(&mut self) {
        let selected: Vec<usize> = self
            .points
            .iter()
            .filter(|p| p.selected)
            .map(|p| p.model_index)
            .collect();

        let n = self.list.len();
        let mut points = Vec::with_capacity(n);
        for (model_index, event) in self.list.events().iter().enumerate() {
            let (tx, ty) = self.model_to_view_coord(event.when, event.value);
            if ty.is_nan() {
                log::warn!("ignoring invalid point on automation line \"{}\"", self.name);
                continue;
            }
            if tx < 0 || tx >= self.maximum_time {
                continue;
            }
            let terminal = model_index == 0 || model_index + 1 == n;
            points.push(ControlPoint {
                x: self.time.samples_to_pixels(tx),
                y: ty,
                model_index,
                view_index: points.len(),
                can_slide: self.terminal_points_can_slide || !terminal,
                selected: selected.contains(&model_index),
            });
        }
        self.points = points;
    }

    pub fn set_selected_points(&mut self, view_indices: &[usize]) {
        for p in &mut self.points {
            p.selected = view_indices.contains(&p.view_index);
        }
    }

    /// Points whose session time is in `[start, end]` and whose height is in
    /// `[bottom, top]` (fractions).
    pub fn get_selectables(&self, start: Samplepos, end: Samplepos, bottom: f64, top: f64) -> Vec<usize> {
        self.points
            .iter()
            .filter(|p| {
                let when = self.list.events()[p.model_index].when + self.origin;
                when >= start && when <= end && p.y >= bottom && p.y <= top
            })
            .map(|p| p.view_index)
            .collect()
    }

    /// Earliest and latest session time of any event.
    pub fn get_point_x_range(&self) -> Option<(Samplepos, Samplepos)> {
        let first = self.list.events().first()?;
        let last = self.list.events().last()?;
        Some((
            first.when + self.offset + self.origin,
            last.when + self.offset + self.origin,
        ))
    }

    /// View indices of the points either side of model time `when`.
    pub fn control_points_adjacent(&self, when: Samplepos) -> Option<(usize, usize)> {
        let x = self.time.samples_to_pixels(when - self.offset);
        let before = self.points.iter().filter(|p| p.x <= x).max_by(|a, b| a.x.total_cmp(&b.x))?;
        let after = self.points.iter().find(|p| p.x > x)?;
        Some((before.view_index, after.view_index))
    }

    pub fn is_first_point(&self, view_index: usize) -> bool {
        self.nth(view_index).is_some_and(|p| p.model_index == 0)
    }

    pub fn is_last_point(&self, view_index: usize) -> bool {
        self.nth(view_index)
            .is_some_and(|p| p.model_index + 1 == self.list.len())
    }

    pub fn remove_point(&mut self, view_index: usize) {
        let Some(model_index) = self.nth(view_index).map(|p| p.model_index) else {
            return;
        };
        self.list.erase(model_index);
        self.reset();
    }

    /// Set one point's value from a view fraction, clamped to the lane.
    pub fn modify_point_y(&mut self, view_index: usize, y: f64) {
        let Some(point) = self.points.get_mut(view_index) else {
            return;
        };
        point.y = y.clamp(0.0, 1.0);
        self.sync_model_with_view_point(view_index);
    }

    fn sync_model_with_view_point(&mut self, view_index: usize) {
        let Some(point) = self.points.get(view_index).copied() else {
            return;
        };
        let Some(event) = self.list.events().get(point.model_index).copied() else {
            return;
        };

        // untouched x keeps the exact model time
        let model_x = self.time.samples_to_pixels(event.when - self.offset);
        let when = if point.x == model_x {
            event.when
        } else {
            self.time.pixels_to_samples(point.x) + self.offset
        };
        let value = self.view_to_model_y(point.y);
        self.list.modify(point.model_index, when, value);
    }

    /// Drag one point, plus every other selected point if it is selected.
    pub fn start_drag_single(&mut self, view_index: usize, x: f64, fraction: f64) {
        let Some(point) = self.nth(view_index) else {
            return;
        };
        let mut drag = vec![view_index];
        if point.selected {
            drag.extend(
                self.points
                    .iter()
                    .filter(|p| p.selected && p.view_index != view_index)
                    .map(|p| p.view_index),
            );
        }
        self.start_drag_common(drag, x, fraction);
    }

    /// Drag the line segment between two points vertically.
    pub fn start_drag_line(&mut self, first: usize, last: usize, fraction: f64) {
        let drag = (first..=last).filter(|i| *i < self.points.len()).collect();
        self.start_drag_common(drag, 0.0, fraction);
    }

    pub fn start_drag_multiple(&mut self, view_indices: &[usize], fraction: f64) {
        let drag = view_indices
            .iter()
            .copied()
            .filter(|i| *i < self.points.len())
            .collect();
        self.start_drag_common(drag, 0.0, fraction);
    }

    fn start_drag_common(&mut self, mut points: Vec<usize>, x: f64, fraction: f64) {
        points.sort_by(|a, b| {
            let (pa, pb) = (&self.points[*a], &self.points[*b]);
            match pa.x.total_cmp(&pb.x) {
                Ordering::Equal => pa.view_index.cmp(&pb.view_index),
                other => other,
            }
        });
        points.dedup();
        self.drag = Some(DragState {
            points,
            runs: Vec::new(),
            x,
            distance: 0.0,
            last_fraction: fraction,
            had_movement: false,
        });
    }

    pub fn dragging(&self) -> bool {
        self.drag.is_some()
    }

    fn contiguous_runs(&self, drag: &[usize]) -> Vec<ContiguousRun> {
        let mut runs: Vec<ContiguousRun> = Vec::new();
        let mut expected = None;
        for &i in drag {
            match runs.last_mut() {
                Some(run) if expected == Some(i) => run.points.push(i),
                _ => runs.push(ContiguousRun {
                    points: vec![i],
                    before_x: 0.0,
                    after_x: f64::MAX,
                }),
            }
            expected = Some(i + 1);
        }

        let n = self.points.len();
        for run in &mut runs {
            if run.points.len() >= n {
                continue;
            }
            if let Some(front) = run.points.first().filter(|f| **f > 0) {
                run.before_x = self.points[front - 1].x;
            }
            if let Some(back) = run.points.last().filter(|b| **b + 1 < n) {
                run.after_x = self.points[back + 1].x;
            }
        }
        runs
    }

    /// Move the dragged points for a pointer at `x` (pixels) and `fraction`.
    ///
    /// Horizontal motion is limited so no run passes a neighbour that is not
    /// being dragged; with `with_push` a later move instead carries every
    /// following slidable point along. Vertical motion is one shared delta,
    /// limited so every dragged point stays inside the lane.
    pub fn drag_motion(&mut self, x: f64, fraction: f64, ignore_x: bool, with_push: bool) -> Option<DragMotion> {
        let mut drag = self.drag.take()?;
        if drag.points.is_empty() {
            self.drag = Some(drag);
            return Some(DragMotion {
                x,
                fraction,
                push_from: None,
            });
        }

        let mut dx = if ignore_x { 0.0 } else { x - drag.x };
        let mut dy = fraction - drag.last_fraction;

        if !drag.had_movement {
            drag.runs = self.contiguous_runs(&drag.points);
        }

        if dx < 0.0 || (dx > 0.0 && !with_push) {
            for run in &drag.runs {
                let clamped = run.clamp_dx(&self.points, dx);
                if clamped.abs() < dx.abs() {
                    dx = clamped;
                }
            }
        }

        for &i in &drag.points {
            let y = self.points[i].y + dy;
            if y < 0.0 {
                dy -= y;
            }
            if y > 1.0 {
                dy -= y - 1.0;
            }
        }

        let mut push_from = None;
        if dx != 0.0 || dy != 0.0 {
            for &i in &drag.points {
                let p = &mut self.points[i];
                if p.can_slide {
                    p.x += dx;
                }
                p.y += dy;
            }
            if with_push {
                let start = drag.runs.last().and_then(|r| r.points.last()).map_or(0, |i| i + 1);
                push_from = Some(start);
                for p in self.points.iter_mut().skip(start) {
                    if !p.can_slide {
                        break;
                    }
                    p.x += dx;
                }
            }
        }

        let used_fraction = drag.last_fraction + dy;
        drag.distance += dx;
        drag.x += dx;
        drag.last_fraction = fraction;
        drag.had_movement = true;
        let motion = DragMotion {
            x: drag.x,
            fraction: used_fraction,
            push_from,
        };
        self.drag = Some(drag);
        Some(motion)
    }

    /// Total horizontal movement of the current drag, in pixels.
    pub fn drag_distance(&self) -> f64 {
        self.drag.as_ref().map_or(0.0, |d| d.distance)
    }

    /// Finish a drag and write the moved points back to the model.
    pub fn end_drag(&mut self, push_from: Option<usize>) {
        let Some(drag) = self.drag.take() else {
            return;
        };
        if !drag.had_movement {
            return;
        }

        for &i in &drag.points {
            self.sync_model_with_view_point(i);
        }
        if let Some(start) = push_from {
            for i in start..self.points.len() {
                if !self.points[i].can_slide {
                    break;
                }
                self.sync_model_with_view_point(i);
            }
        }

        self.list.sort();
        self.reset();
        log::debug!("automation line \"{}\": moved {} points", self.name, drag.points.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // default context: 240 samples per pixel
    fn line(kind: ParameterDescriptor, events: &[(Samplepos, f64)]) -> AutomationLine {
        let mut list = ControlList::new(kind);
        for (when, value) in events {
            list.add(*when, *value);
        }
        AutomationLine::new("test", list, TimeContext::default(), 2.0)
    }

    fn xs(line: &AutomationLine) -> Vec<f64> {
        line.points().iter().map(|p| p.x).collect()
    }

    fn whens(line: &AutomationLine) -> Vec<Samplepos> {
        line.list().events().iter().map(|e| e.when).collect()
    }

    #[test]
    fn test_control_list_keeps_time_order() {
        let mut list = ControlList::new(ParameterDescriptor::pan());
        list.add(2400, 0.5);
        list.add(0, 0.1);
        let at = list.add(2400, 0.9);
        assert_eq!(at, 2, "equal times go after existing events");
        assert_eq!(list.erase(7), None);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_gain_mapping_round_trips() {
        for gain in [0.0, 0.25, 1.0, 1.5, 2.0] {
            let pos = gain_to_slider_position_with_max(gain, 2.0);
            assert!((0.0..=1.0).contains(&pos));
            let back = slider_position_to_gain_with_max(pos, 2.0);
            assert!((back - gain).abs() < 1e-9, "{gain} came back as {back}");
        }
        assert_eq!(gain_to_slider_position_with_max(2.0, 2.0), 1.0);
    }

    #[test]
    fn test_view_mapping_per_kind() {
        let pan = line(ParameterDescriptor::pan(), &[]);
        assert_eq!(pan.model_to_view_y(0.25), 0.75);
        assert_eq!(pan.view_to_model_y(0.75), 0.25);

        let plugin = line(ParameterDescriptor::plugin(-10.0, 10.0), &[]);
        assert_eq!(plugin.model_to_view_y(5.0), 0.75);
        assert_eq!(plugin.view_to_model_y(0.75), 5.0);

        let cc = line(ParameterDescriptor::discrete(127.0), &[]);
        assert_eq!(cc.view_to_model_y(0.5), 64.0);

        let gain = line(ParameterDescriptor::gain(), &[]);
        assert_eq!(gain.view_to_model_y(1.0), 2.0);
        assert_eq!(gain.view_to_model_y(0.0), 0.0);
    }

    #[test]
    fn test_reset_skips_points_outside_view() {
        let mut l = line(ParameterDescriptor::pan(), &[(0, 0.5), (2400, 0.5), (4800, 0.5)]);
        assert_eq!(xs(&l), vec![0.0, 10.0, 20.0]);

        l.set_offset(2400);
        assert_eq!(xs(&l), vec![0.0, 10.0]);
        assert_eq!(l.nth(0).map(|p| p.model_index), Some(1));

        l.set_offset(0);
        l.set_maximum_time(4800);
        assert_eq!(l.npoints(), 2);
    }

    #[test]
    fn test_drag_cannot_cross_still_neighbours() {
        let mut l = line(
            ParameterDescriptor::pan(),
            &[(0, 0.5), (2400, 0.5), (4800, 0.5), (7200, 0.5)],
        );

        l.start_drag_single(1, 10.0, 0.5);
        let motion = l.drag_motion(100.0, 0.5, false, false).expect("dragging");
        assert_eq!(motion.x, 20.0, "stops at the next point");
        l.end_drag(motion.push_from);
        assert_eq!(whens(&l), vec![0, 4800, 4800, 7200]);

        l.start_drag_single(2, 20.0, 0.5);
        let motion = l.drag_motion(-100.0, 0.5, false, false).expect("dragging");
        assert_eq!(motion.x, 20.0, "already touching the previous point");
    }

    #[test]
    fn test_discontiguous_drag_clamps_by_tightest_run() {
        let mut l = line(
            ParameterDescriptor::pan(),
            &[(0, 0.5), (2400, 0.5), (4800, 0.5), (6000, 0.5), (9600, 0.5)],
        );
        // runs {1} and {3}: room after them is 10px and 15px
        l.start_drag_multiple(&[3, 1], 0.5);
        l.drag_motion(0.0, 0.5, false, false);
        let motion = l.drag_motion(12.0, 0.5, false, false).expect("dragging");
        assert_eq!(motion.x, 10.0);
        assert_eq!(xs(&l), vec![0.0, 20.0, 20.0, 35.0, 40.0]);
    }

    #[test]
    fn test_vertical_drag_clamps_shared_delta() {
        let mut l = line(ParameterDescriptor::pan(), &[(0, 0.5), (2400, 0.2), (4800, 0.5)]);
        // view y is 1 - value: 0.5, 0.8, 0.5
        l.start_drag_line(0, 2, 0.5);
        let motion = l.drag_motion(0.0, 0.9, true, false).expect("dragging");

        assert!((motion.fraction - 0.7).abs() < 1e-12, "limited by the highest point");
        let ys: Vec<f64> = l.points().iter().map(|p| p.y).collect();
        assert!((ys[1] - 1.0).abs() < 1e-12);
        assert!((ys[0] - 0.7).abs() < 1e-12);

        l.end_drag(motion.push_from);
        let values: Vec<f64> = l.list().events().iter().map(|e| e.value).collect();
        assert!(values[1].abs() < 1e-12);
        assert!((values[0] - 0.3).abs() < 1e-12);
        assert_eq!(whens(&l), vec![0, 2400, 4800], "x untouched");
    }

    #[test]
    fn test_push_moves_later_points() {
        let mut l = line(
            ParameterDescriptor::pan(),
            &[(0, 0.5), (2400, 0.5), (4800, 0.5), (7200, 0.5)],
        );
        l.start_drag_single(1, 10.0, 0.5);
        let motion = l.drag_motion(15.0, 0.5, false, true).expect("dragging");
        assert_eq!(motion.push_from, Some(2));
        l.end_drag(motion.push_from);

        assert_eq!(whens(&l), vec![0, 3600, 6000, 8400]);
    }

    #[test]
    fn test_push_stops_at_pinned_terminal_point() {
        let mut l = line(
            ParameterDescriptor::pan(),
            &[(0, 0.5), (2400, 0.5), (4800, 0.5), (7200, 0.5)],
        );
        l.set_terminal_points_can_slide(false);
        l.start_drag_single(1, 10.0, 0.5);
        let motion = l.drag_motion(12.0, 0.5, false, true).expect("dragging");
        l.end_drag(motion.push_from);

        assert_eq!(whens(&l), vec![0, 2880, 5280, 7200]);
    }

    #[test]
    fn test_end_drag_without_motion_changes_nothing() {
        let mut l = line(ParameterDescriptor::pan(), &[(0, 0.5), (2400, 0.5)]);
        let before = l.list().clone();
        l.start_drag_single(1, 10.0, 0.5);
        l.end_drag(None);
        assert_eq!(l.list(), &before);
        assert!(!l.dragging());
    }

    #[test]
    fn test_selected_points_drag_together() {
        let mut l = line(ParameterDescriptor::pan(), &[(0, 0.5), (2400, 0.5), (4800, 0.5), (9600, 0.5)]);
        l.set_selected_points(&[1, 2]);
        l.start_drag_single(1, 10.0, 0.5);
        let motion = l.drag_motion(15.0, 0.5, false, false).expect("dragging");
        l.end_drag(motion.push_from);

        assert_eq!(whens(&l), vec![0, 3600, 6000, 9600]);
        assert!(l.nth(1).is_some_and(|p| p.selected), "selection survives the reset");
    }

    #[test]
    fn test_modify_point_y_clamps() {
        let mut l = line(ParameterDescriptor::plugin(0.0, 100.0), &[(0, 50.0)]);
        l.modify_point_y(0, 1.5);
        assert_eq!(l.list().events()[0].value, 100.0);
        assert_eq!(l.list().events()[0].when, 0);
    }

    #[test]
    fn test_point_queries() {
        let mut l = line(ParameterDescriptor::pan(), &[(0, 0.0), (2400, 0.5), (4800, 1.0)]);
        l.set_origin(48_000);

        assert_eq!(l.control_points_adjacent(3000), Some((1, 2)));
        assert_eq!(l.control_points_adjacent(5000), None);
        assert!(l.is_first_point(0) && !l.is_first_point(1));
        assert!(l.is_last_point(2));
        assert_eq!(l.get_point_x_range(), Some((48_000, 52_800)));
        // view y is inverted for pan: 1.0, 0.5, 0.0
        assert_eq!(l.get_selectables(48_000, 51_000, 0.4, 1.0), vec![0, 1]);

        l.remove_point(1);
        assert_eq!(l.npoints(), 2);
        assert_eq!(whens(&l), vec![0, 4800]);
    }
}
