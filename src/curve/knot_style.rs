use std::str::FromStr;

use itertools::Itertools;
use nalgebra::Point3;

use crate::error::Error;
use crate::misc::FloatingPoint;

/// Parameterization scheme for points interpolation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KnotStyle {
    /// Equally spaced parameters
    Uniform,
    /// Chord length parameterization
    Chord,
    /// Square root of chord length, tempers the pull of long chords
    ChordSqrt,
}

impl KnotStyle {
    /// Assign a parameter in [0, 1] to each input point,
    /// cumulative sums normalized by the total.
    pub fn parameterize<T: FloatingPoint>(&self, points: &[Point3<T>]) -> Result<Vec<T>, Error> {
        let n = points.len();
        match self {
            KnotStyle::Uniform => {
                let inv = T::one() / T::from_usize(n - 1).unwrap();
                Ok((0..n).map(|i| T::from_usize(i).unwrap() * inv).collect())
            }
            KnotStyle::Chord | KnotStyle::ChordSqrt => {
                let alpha = self.alpha();
                let chords: Vec<T> = points
                    .iter()
                    .tuple_windows()
                    .map(|(a, b)| (b - a).norm().powf(alpha))
                    .collect();
                let total = chords.iter().fold(T::zero(), |acc, c| acc + *c);
                if total <= T::default_epsilon() {
                    // all points coincide, the collocation matrix would be singular
                    return Err(Error::SingularSystem);
                }
                let mut params = Vec::with_capacity(n);
                params.push(T::zero());
                let mut acc = T::zero();
                for c in chords {
                    acc += c;
                    params.push(acc / total);
                }
                Ok(params)
            }
        }
    }

    fn alpha<T: FloatingPoint>(&self) -> T {
        match self {
            KnotStyle::Chord => T::one(),
            KnotStyle::ChordSqrt => T::from_f64(0.5).unwrap(),
            KnotStyle::Uniform => T::one(),
        }
    }
}

impl FromStr for KnotStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uniform" => Ok(KnotStyle::Uniform),
            "chord" => Ok(KnotStyle::Chord),
            "chord_sqrt" => Ok(KnotStyle::ChordSqrt),
            other => Err(Error::InvalidKnotStyle(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn test_parameterize_bounds() {
        let points = vec![
            Point3::new(0., 0., 0.),
            Point3::new(1., 0., 0.),
            Point3::new(1., 3., 0.),
            Point3::new(2., 3., 0.),
        ];
        for style in [KnotStyle::Uniform, KnotStyle::Chord, KnotStyle::ChordSqrt] {
            let params = style.parameterize(&points).unwrap();
            assert_eq!(params.len(), points.len());
            assert_eq!(params[0], 0.);
            assert_eq!(params[params.len() - 1], 1.);
            assert!(params.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_chord_parameterize() {
        let points = vec![
            Point3::new(0., 0., 0.),
            Point3::new(1., 0., 0.),
            Point3::new(1., 3., 0.),
        ];
        let params = KnotStyle::Chord.parameterize(&points).unwrap();
        assert_eq!(params, vec![0., 0.25, 1.]);
    }

    #[test]
    fn test_coincident_points_rejected() {
        let points = vec![Point3::<f64>::origin(); 4];
        assert_eq!(
            KnotStyle::Chord.parameterize(&points).unwrap_err(),
            Error::SingularSystem
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!("uniform".parse::<KnotStyle>().unwrap(), KnotStyle::Uniform);
        assert_eq!("chord".parse::<KnotStyle>().unwrap(), KnotStyle::Chord);
        assert_eq!(
            "chord_sqrt".parse::<KnotStyle>().unwrap(),
            KnotStyle::ChordSqrt
        );
        assert!(matches!(
            "centripetal".parse::<KnotStyle>(),
            Err(Error::InvalidKnotStyle(_))
        ));
    }
}
