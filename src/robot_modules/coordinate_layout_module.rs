use std::ops::Range;
use serde::{Serialize, Deserialize};
use crate::utils::utils_errors::WholeBodyError;

/// The `GeneralizedCoordinateLayout` maps semantic joint groups of a wheeled, floating-base
/// humanoid onto index ranges of the generalized-coordinate vector.  Every component of the
/// controller shares one layout instance instead of hard-coding offsets, so the ordering
/// assumptions of the whole pipeline live in exactly one place.
///
/// The reference layout has 25 generalized coordinates: indices 0..3 are the floating-base
/// rotation (index 0 is the pitch/heading axis that the rolling constraints couple to the
/// wheels), 3..6 the floating-base translation, 6..8 the two wheel joints, 8 the waist,
/// 9 the torso, 10 the head/neck, 11..18 the left arm, and 18..25 the right arm.
///
/// The optimization variable the controller solves for stacks the generalized accelerations
/// with one Lagrange multiplier per rolling constraint, so its dimension is
/// `num_coordinates() + num_rolling_constraints()` (30 in the reference layout).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneralizedCoordinateLayout {
    num_coordinates: usize,
    num_rolling_constraints: usize,
    base_rotation_coordinates: Range<usize>,
    base_translation_coordinates: Range<usize>,
    wheel_coordinates: Range<usize>,
    waist_coordinate: usize,
    torso_coordinate: usize,
    neck_coordinate: usize,
    left_arm_coordinates: Range<usize>,
    right_arm_coordinates: Range<usize>
}
impl GeneralizedCoordinateLayout {
    pub fn new(num_coordinates: usize,
               num_rolling_constraints: usize,
               base_rotation_coordinates: Range<usize>,
               base_translation_coordinates: Range<usize>,
               wheel_coordinates: Range<usize>,
               waist_coordinate: usize,
               torso_coordinate: usize,
               neck_coordinate: usize,
               left_arm_coordinates: Range<usize>,
               right_arm_coordinates: Range<usize>) -> Result<Self, WholeBodyError> {
        let out_self = Self {
            num_coordinates,
            num_rolling_constraints,
            base_rotation_coordinates,
            base_translation_coordinates,
            wheel_coordinates,
            waist_coordinate,
            torso_coordinate,
            neck_coordinate,
            left_arm_coordinates,
            right_arm_coordinates
        };

        out_self.check_contiguity()?;

        return Ok(out_self);
    }
    /// The 25-coordinate layout described in the struct-level documentation.
    pub fn new_reference_layout() -> Self {
        return Self::new(25, 5, 0..3, 3..6, 6..8, 8, 9, 10, 11..18, 18..25).expect("reference layout must be valid");
    }
    fn check_contiguity(&self) -> Result<(), WholeBodyError> {
        let groups = [
            ("base rotation", self.base_rotation_coordinates.clone()),
            ("base translation", self.base_translation_coordinates.clone()),
            ("wheels", self.wheel_coordinates.clone()),
            ("waist", self.waist_coordinate..self.waist_coordinate+1),
            ("torso", self.torso_coordinate..self.torso_coordinate+1),
            ("neck", self.neck_coordinate..self.neck_coordinate+1),
            ("left arm", self.left_arm_coordinates.clone()),
            ("right arm", self.right_arm_coordinates.clone())
        ];

        let mut expected_start = 0;
        for (name, range) in &groups {
            if range.start != expected_start || range.end <= range.start {
                return Err(WholeBodyError::new_generic_error_str(&format!("joint group {:?} does not contiguously follow the previous group (starts at {:?}, expected {:?}).", name, range.start, expected_start), file!(), line!()));
            }
            expected_start = range.end;
        }
        if expected_start != self.num_coordinates {
            return Err(WholeBodyError::new_generic_error_str(&format!("joint groups cover {:?} coordinates, but the layout declares {:?}.", expected_start, self.num_coordinates), file!(), line!()));
        }
        if self.num_rolling_constraints == 0 {
            return Err(WholeBodyError::new_generic_error_str("layout must declare at least one rolling constraint.", file!(), line!()));
        }

        Ok(())
    }
    pub fn num_coordinates(&self) -> usize {
        self.num_coordinates
    }
    pub fn num_rolling_constraints(&self) -> usize {
        self.num_rolling_constraints
    }
    /// Dimension of the optimization variable (generalized accelerations + rolling-constraint multipliers).
    pub fn num_problem_variables(&self) -> usize {
        self.num_coordinates + self.num_rolling_constraints
    }
    /// The six unconstrained floating-base coordinates (rotation followed by translation).
    pub fn base_coordinates(&self) -> Range<usize> {
        self.base_rotation_coordinates.start..self.base_translation_coordinates.end
    }
    pub fn num_base_coordinates(&self) -> usize {
        self.base_coordinates().len()
    }
    /// The base rotation coordinate that the rolling constraints couple to wheel spin.
    pub fn base_pitch_coordinate(&self) -> usize {
        self.base_rotation_coordinates.start
    }
    pub fn base_rotation_coordinates(&self) -> Range<usize> {
        self.base_rotation_coordinates.clone()
    }
    pub fn base_translation_coordinates(&self) -> Range<usize> {
        self.base_translation_coordinates.clone()
    }
    pub fn wheel_coordinates(&self) -> Range<usize> {
        self.wheel_coordinates.clone()
    }
    pub fn left_wheel_coordinate(&self) -> usize {
        self.wheel_coordinates.start
    }
    pub fn right_wheel_coordinate(&self) -> usize {
        self.wheel_coordinates.start + 1
    }
    pub fn waist_coordinate(&self) -> usize {
        self.waist_coordinate
    }
    pub fn torso_coordinate(&self) -> usize {
        self.torso_coordinate
    }
    pub fn neck_coordinate(&self) -> usize {
        self.neck_coordinate
    }
    pub fn left_arm_coordinates(&self) -> Range<usize> {
        self.left_arm_coordinates.clone()
    }
    pub fn right_arm_coordinates(&self) -> Range<usize> {
        self.right_arm_coordinates.clone()
    }
    /// All actuated coordinates (everything that is not part of the floating base).
    pub fn actuated_coordinates(&self) -> Range<usize> {
        self.base_translation_coordinates.end..self.num_coordinates
    }
    pub fn num_actuated_coordinates(&self) -> usize {
        self.actuated_coordinates().len()
    }
    /// Upper-body coordinates above waist and torso (neck and both arms).
    pub fn upper_body_coordinates(&self) -> Range<usize> {
        self.neck_coordinate..self.right_arm_coordinates.end
    }
    /// Columns of the optimization variable holding the rolling-constraint multipliers.
    pub fn multiplier_variables(&self) -> Range<usize> {
        self.num_coordinates..self.num_coordinates + self.num_rolling_constraints
    }
}
impl Default for GeneralizedCoordinateLayout {
    fn default() -> Self {
        Self::new_reference_layout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_layout_dimensions() {
        let layout = GeneralizedCoordinateLayout::new_reference_layout();
        assert_eq!(layout.num_coordinates(), 25);
        assert_eq!(layout.num_rolling_constraints(), 5);
        assert_eq!(layout.num_problem_variables(), 30);
        assert_eq!(layout.num_base_coordinates(), 6);
        assert_eq!(layout.num_actuated_coordinates(), 19);
        assert_eq!(layout.actuated_coordinates(), 6..25);
        assert_eq!(layout.multiplier_variables(), 25..30);
        assert_eq!(layout.base_pitch_coordinate(), 0);
        assert_eq!(layout.left_wheel_coordinate(), 6);
        assert_eq!(layout.right_wheel_coordinate(), 7);
    }

    #[test]
    fn test_non_contiguous_layout_is_rejected() {
        let res = GeneralizedCoordinateLayout::new(25, 5, 0..3, 3..6, 7..9, 9, 10, 11, 12..19, 19..25);
        assert!(res.is_err());
    }
}
