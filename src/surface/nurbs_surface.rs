use anyhow::Context;
use nalgebra::{convert, Matrix2, Point3, Vector3, Vector4};
use simba::scalar::SupersetOf;

use crate::curve::helper::refine_knot_vector;
use crate::curve::NurbsCurve;
use crate::error::Error;
use crate::knot::KnotVector;
use crate::misc::{transpose_grid, Binomial, FloatingPoint, SurfaceCurvature};
use crate::surface::UVDirection;

/// NURBS surface representation
/// Control points are stored as a rectangular grid in Euclidean space,
/// the outer vec runs along u and each row along v.
/// An optional weight grid of the same shape makes the surface rational.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NurbsSurface<T: FloatingPoint> {
    u_degree: usize,
    v_degree: usize,
    u_knots: KnotVector<T>,
    v_knots: KnotVector<T>,
    control_points: Vec<Vec<Point3<T>>>,
    weights: Option<Vec<Vec<T>>>,
}

impl<T: FloatingPoint> NurbsSurface<T> {
    /// Create a non-rational surface with explicit knot vectors.
    /// Both knot vectors are normalized to the [0, 1] domain.
    pub fn try_new(
        u_degree: usize,
        v_degree: usize,
        u_knots: Vec<T>,
        v_knots: Vec<T>,
        control_points: Vec<Vec<Point3<T>>>,
    ) -> anyhow::Result<Self> {
        Self::try_create(u_degree, v_degree, u_knots, v_knots, control_points, None)
    }

    /// Create a rational surface with explicit knot vectors and a weight grid.
    pub fn try_rational(
        u_degree: usize,
        v_degree: usize,
        u_knots: Vec<T>,
        v_knots: Vec<T>,
        control_points: Vec<Vec<Point3<T>>>,
        weights: Vec<Vec<T>>,
    ) -> anyhow::Result<Self> {
        Self::try_create(
            u_degree,
            v_degree,
            u_knots,
            v_knots,
            control_points,
            Some(weights),
        )
    }

    /// Create a non-rational surface with clamped uniform knot vectors on [0, 1].
    pub fn try_uniform(
        u_degree: usize,
        v_degree: usize,
        control_points: Vec<Vec<Point3<T>>>,
    ) -> anyhow::Result<Self> {
        let rows = control_points.len();
        let cols = control_points.first().map(|r| r.len()).unwrap_or(0);
        if rows < u_degree + 1 || cols < v_degree + 1 {
            return Err(Error::InvalidControlPoints(format!(
                "got a {}x{} grid, degrees ({}, {}) need at least ({}, {})",
                rows,
                cols,
                u_degree,
                v_degree,
                u_degree + 1,
                v_degree + 1
            ))
            .into());
        }
        let u_knots = KnotVector::uniform(rows, u_degree).to_vec();
        let v_knots = KnotVector::uniform(cols, v_degree).to_vec();
        Self::try_create(u_degree, v_degree, u_knots, v_knots, control_points, None)
    }

    fn try_create(
        u_degree: usize,
        v_degree: usize,
        u_knots: Vec<T>,
        v_knots: Vec<T>,
        control_points: Vec<Vec<Point3<T>>>,
        weights: Option<Vec<Vec<T>>>,
    ) -> anyhow::Result<Self> {
        let rows = control_points.len();
        let cols = control_points.first().map(|r| r.len()).unwrap_or(0);
        if rows < u_degree + 1 || cols < v_degree + 1 {
            return Err(Error::InvalidControlPoints(format!(
                "got a {}x{} grid, degrees ({}, {}) need at least ({}, {})",
                rows,
                cols,
                u_degree,
                v_degree,
                u_degree + 1,
                v_degree + 1
            ))
            .into());
        }
        if control_points.iter().any(|row| row.len() != cols) {
            return Err(Error::InvalidControlPoints(
                "control point grid is not rectangular".to_string(),
            )
            .into());
        }

        let u_knots = KnotVector::try_validated(u_knots, rows, u_degree)?.normalized()?;
        let v_knots = KnotVector::try_validated(v_knots, cols, v_degree)?.normalized()?;

        if let Some(w) = &weights {
            if w.len() != rows || w.iter().any(|row| row.len() != cols) {
                return Err(Error::InvalidWeights(
                    "weight grid shape does not match control points".to_string(),
                )
                .into());
            }
            if w.iter().flatten().any(|wi| *wi <= T::zero()) {
                return Err(
                    Error::InvalidWeights("weights must be positive".to_string()).into(),
                );
            }
        }

        Ok(Self {
            u_degree,
            v_degree,
            u_knots,
            v_knots,
            control_points,
            weights,
        })
    }

    /// Return a copy of the surface with a new control point grid, re-validated.
    pub fn with_control_points(
        &self,
        control_points: Vec<Vec<Point3<T>>>,
    ) -> anyhow::Result<Self> {
        Self::try_create(
            self.u_degree,
            self.v_degree,
            self.u_knots.to_vec(),
            self.v_knots.to_vec(),
            control_points,
            self.weights.clone(),
        )
    }

    /// Return a copy of the surface with a new weight grid, re-validated.
    /// `None` makes the surface non-rational.
    pub fn with_weights(&self, weights: Option<Vec<Vec<T>>>) -> anyhow::Result<Self> {
        Self::try_create(
            self.u_degree,
            self.v_degree,
            self.u_knots.to_vec(),
            self.v_knots.to_vec(),
            self.control_points.clone(),
            weights,
        )
    }

    /// Evaluate the surface at the given uv parameters to get a point
    pub fn point_at(&self, u: T, v: T) -> Point3<T> {
        let n = self.control_points.len() - 1;
        let m = self.control_points[0].len() - 1;
        let span_u = self.u_knots.find_knot_span_index(n, self.u_degree, u);
        let span_v = self.v_knots.find_knot_span_index(m, self.v_degree, v);
        let basis_u = self.u_knots.basis_functions(span_u, u, self.u_degree);
        let basis_v = self.v_knots.basis_functions(span_v, v, self.v_degree);

        match &self.weights {
            None => {
                let mut position = Point3::origin();
                for r in 0..=self.u_degree {
                    let mut temp = Vector3::zeros();
                    for s in 0..=self.v_degree {
                        temp += self.control_points[span_u - self.u_degree + r]
                            [span_v - self.v_degree + s]
                            .coords
                            * basis_v[s];
                    }
                    position.coords += temp * basis_u[r];
                }
                position
            }
            Some(_) => {
                let mut hw = Vector4::zeros();
                for r in 0..=self.u_degree {
                    let mut temp = Vector4::zeros();
                    for s in 0..=self.v_degree {
                        temp += self.homogeneous_control_point(
                            span_u - self.u_degree + r,
                            span_v - self.v_degree + s,
                        ) * basis_v[s];
                    }
                    hw += temp * basis_u[r];
                }
                Point3::new(hw.x / hw.w, hw.y / hw.w, hw.z / hw.w)
            }
        }
    }

    /// Evaluate the surface at each of the given uv pairs, preserving order
    pub fn points_at(&self, params: &[(T, T)]) -> Vec<Point3<T>> {
        params.iter().map(|(u, v)| self.point_at(*u, *v)).collect()
    }

    /// Evaluate the raw partial derivatives S_kl for 0 <= k + l <= order.
    /// The result is triangular: row k holds S_k0..S_k(order-k),
    /// S_00 being the position, S_10 and S_01 the first partials.
    /// Fails when the order exceeds the degree in either direction.
    pub fn derivatives_at(
        &self,
        u: T,
        v: T,
        order: usize,
    ) -> anyhow::Result<Vec<Vec<Vector3<T>>>> {
        if order > self.u_degree {
            return Err(Error::MismatchedDerivativeOrder {
                order,
                degree: self.u_degree,
            }
            .into());
        }
        if order > self.v_degree {
            return Err(Error::MismatchedDerivativeOrder {
                order,
                degree: self.v_degree,
            }
            .into());
        }
        self.dehomogenized_derivatives(u, v, order)
    }

    /// Partial derivatives without the order guard, partials beyond a
    /// direction's degree being identically zero.
    fn dehomogenized_derivatives(
        &self,
        u: T,
        v: T,
        order: usize,
    ) -> anyhow::Result<Vec<Vec<Vector3<T>>>> {
        let ders = self.homogeneous_derivatives(u, v, order)?;
        match &self.weights {
            None => Ok((0..=order)
                .map(|k| (0..=(order - k)).map(|l| ders[k][l].xyz()).collect())
                .collect()),
            Some(_) => Ok(rational_derivatives(&ders, order)),
        }
    }

    /// Evaluate the unit normal at the given uv parameters
    pub fn normal_at(&self, u: T, v: T) -> anyhow::Result<Vector3<T>> {
        let deriv = self.derivatives_at(u, v, 1)?;
        let cross = deriv[1][0].cross(&deriv[0][1]);
        let norm = cross.norm();
        if norm <= T::default_epsilon() {
            return Err(Error::DegenerateTangent.into());
        }
        Ok(cross / norm)
    }

    /// Evaluate unit normals at each of the given uv pairs, preserving order
    pub fn normals_at(&self, params: &[(T, T)]) -> anyhow::Result<Vec<Vector3<T>>> {
        params
            .iter()
            .enumerate()
            .map(|(i, (u, v))| {
                self.normal_at(*u, *v)
                    .with_context(|| format!("normal evaluation failed at parameter index {}", i))
            })
            .collect()
    }

    /// Evaluate the principal, mean and Gaussian curvatures at the given uv
    /// parameters via the shape operator.
    /// The first fundamental form G is built from the first partials, the
    /// second fundamental form L from the projections of the second partials
    /// onto the unit normal, and the shape operator is G^-1 * L. Its
    /// eigenvalues are the principal curvatures (ascending), its eigenvectors
    /// mapped through the first partials give the principal directions.
    /// Second partials in a degree 1 direction are zero, so ruled surfaces
    /// and extrusions work.
    pub fn curvature_at(&self, u: T, v: T) -> anyhow::Result<SurfaceCurvature<T>> {
        let ders = self.dehomogenized_derivatives(u, v, 2)?;
        let s10 = ders[1][0];
        let s01 = ders[0][1];
        let s20 = ders[2][0];
        let s02 = ders[0][2];
        let s11 = ders[1][1];

        let cross = s10.cross(&s01);
        let norm = cross.norm();
        if norm <= T::default_epsilon() {
            return Err(Error::DegenerateTangent.into());
        }
        let normal = cross / norm;

        let g = Matrix2::new(
            s10.dot(&s10),
            s10.dot(&s01),
            s10.dot(&s01),
            s01.dot(&s01),
        );
        let l = Matrix2::new(
            s20.dot(&normal),
            s11.dot(&normal),
            s11.dot(&normal),
            s02.dot(&normal),
        );

        let det_g = g.determinant();
        if det_g.abs() <= T::default_epsilon() {
            return Err(Error::DegenerateTangent.into());
        }
        let g_inv = g.try_inverse().ok_or(Error::DegenerateTangent)?;
        let shape = g_inv * l;

        // closed-form eigenvalues of the 2x2 shape operator
        let two = T::from_f64(2.).unwrap();
        let half_trace = (shape.m11 + shape.m22) / two;
        let disc = (half_trace * half_trace - shape.determinant()).max(T::zero());
        let sq = disc.sqrt();
        let kappa = (half_trace - sq, half_trace + sq);

        let direction = |k: T| -> Vector3<T> {
            // eigenvector of (shape - k I), mapped into the tangent plane
            let r1 = (shape.m12, k - shape.m11);
            let r2 = (k - shape.m22, shape.m21);
            let n1 = r1.0 * r1.0 + r1.1 * r1.1;
            let n2 = r2.0 * r2.0 + r2.1 * r2.1;
            let (x, y) = if n1 >= n2 && n1 > T::default_epsilon() {
                r1
            } else if n2 > T::default_epsilon() {
                r2
            } else {
                // umbilic point, every direction is principal
                (T::one(), T::zero())
            };
            (s10 * x + s01 * y).normalize()
        };
        let directions = (direction(kappa.0), direction(kappa.1));

        let mean = half_trace;
        let gauss = l.determinant() / det_g;

        Ok(SurfaceCurvature::new(
            normal, kappa, directions, mean, gauss,
        ))
    }

    /// Evaluate curvatures at each of the given uv pairs, preserving order
    pub fn curvatures_at(&self, params: &[(T, T)]) -> anyhow::Result<Vec<SurfaceCurvature<T>>> {
        params
            .iter()
            .enumerate()
            .map(|(i, (u, v))| {
                self.curvature_at(*u, *v).with_context(|| {
                    format!("curvature evaluation failed at parameter index {}", i)
                })
            })
            .collect()
    }

    /// Return a refined copy of the surface with the given knots inserted in
    /// one parameter direction. The surface geometry is preserved.
    pub fn try_refine_knot(
        &self,
        knots_to_insert: Vec<T>,
        direction: UVDirection,
    ) -> anyhow::Result<Self> {
        match direction {
            UVDirection::U => {
                let transposed = self.transposed();
                let refined = transposed.try_refine_knot(knots_to_insert, UVDirection::V)?;
                Ok(refined.transposed())
            }
            UVDirection::V => {
                if knots_to_insert.is_empty() {
                    return Ok(self.clone());
                }
                if !self.v_knots.is_clamped(self.v_degree) {
                    return Err(Error::InvalidKnotVector(
                        "knot insertion requires a clamped knot vector".to_string(),
                    )
                    .into());
                }
                if knots_to_insert.windows(2).any(|w| w[0] > w[1]) {
                    return Err(Error::InvalidKnotVector(
                        "insertion knots must be sorted".to_string(),
                    )
                    .into());
                }
                let (start, end) = self.v_knots.domain(self.v_degree);
                if knots_to_insert
                    .iter()
                    .any(|t| *t <= start + T::default_epsilon() || *t >= end - T::default_epsilon())
                {
                    return Err(Error::InvalidKnotVector(
                        "insertion knots must lie strictly inside the domain".to_string(),
                    )
                    .into());
                }

                let cols = self.control_points[0].len();
                let mut control_points = vec![];
                let mut weights = vec![];
                let mut v_knots = self.v_knots.clone();

                // refine each row of the grid along v with the same knot set
                for (i, row) in self.control_points.iter().enumerate() {
                    let homogeneous: Vec<Vector4<T>> = (0..cols)
                        .map(|j| self.homogeneous_control_point(i, j))
                        .collect();
                    let (refined, knots) = refine_knot_vector(
                        self.v_degree,
                        &self.v_knots,
                        &homogeneous,
                        &knots_to_insert,
                    );
                    debug_assert_eq!(refined.len(), row.len() + knots_to_insert.len());
                    match &self.weights {
                        None => {
                            control_points
                                .push(refined.iter().map(|h| Point3::new(h.x, h.y, h.z)).collect());
                        }
                        Some(_) => {
                            control_points.push(
                                refined
                                    .iter()
                                    .map(|h| Point3::new(h.x / h.w, h.y / h.w, h.z / h.w))
                                    .collect(),
                            );
                            weights.push(refined.iter().map(|h| h.w).collect());
                        }
                    }
                    v_knots = knots;
                }

                Ok(Self {
                    u_degree: self.u_degree,
                    v_degree: self.v_degree,
                    u_knots: self.u_knots.clone(),
                    v_knots,
                    control_points,
                    weights: self.weights.as_ref().map(|_| weights),
                })
            }
        }
    }

    /// Extract the isocurve at a fixed parameter.
    /// `direction` names the parameter being fixed: `U` yields a curve
    /// running along v and vice versa.
    ///
    /// The fixed parameter is inserted into the knot vector until it reaches
    /// multiplicity degree + 1, at which point one row of the refined control
    /// grid lies exactly on the surface. At the domain boundaries no insertion
    /// is needed since the clamped surface already interpolates the boundary
    /// rows.
    pub fn try_isocurve(&self, t: T, direction: UVDirection) -> anyhow::Result<NurbsCurve<T>> {
        match direction {
            UVDirection::U => {
                let (start, end) = self.u_knots.domain(self.u_degree);
                if t <= start + T::default_epsilon() {
                    return self.row_curve(0);
                }
                if t >= end - T::default_epsilon() {
                    return self.row_curve(self.control_points.len() - 1);
                }

                let multiplicity = self.u_knots.multiplicity_at(t);
                let required = self.u_degree + 1 - multiplicity;
                let refined = if required > 0 {
                    self.try_refine_knot(vec![t; required], UVDirection::U)?
                } else {
                    self.clone()
                };

                let span = refined.u_knots.find_knot_span_index(
                    refined.control_points.len() - 1,
                    refined.u_degree,
                    t,
                );
                refined.row_curve(span - refined.u_degree)
            }
            UVDirection::V => self.transposed().try_isocurve(t, UVDirection::U),
        }
    }

    /// Build the curve along v formed by one row of the control grid
    fn row_curve(&self, index: usize) -> anyhow::Result<NurbsCurve<T>> {
        let points = self.control_points[index].clone();
        match &self.weights {
            None => NurbsCurve::try_new(self.v_degree, points, self.v_knots.to_vec()),
            Some(w) => NurbsCurve::try_rational(
                self.v_degree,
                points,
                self.v_knots.to_vec(),
                w[index].clone(),
            ),
        }
    }

    /// Return the surface with the roles of u and v exchanged
    pub fn transposed(&self) -> Self {
        Self {
            u_degree: self.v_degree,
            v_degree: self.u_degree,
            u_knots: self.v_knots.clone(),
            v_knots: self.u_knots.clone(),
            control_points: transpose_grid(&self.control_points),
            weights: self.weights.as_ref().map(|w| transpose_grid(w)),
        }
    }

    /// The control point in homogeneous coordinates (wx, wy, wz, w)
    fn homogeneous_control_point(&self, i: usize, j: usize) -> Vector4<T> {
        let p = &self.control_points[i][j];
        match &self.weights {
            Some(w) => {
                let wij = w[i][j];
                Vector4::new(p.x * wij, p.y * wij, p.z * wij, wij)
            }
            None => Vector4::new(p.x, p.y, p.z, T::one()),
        }
    }

    fn homogeneous_derivatives(
        &self,
        u: T,
        v: T,
        order: usize,
    ) -> anyhow::Result<Vec<Vec<Vector4<T>>>> {
        let n = self.control_points.len() - 1;
        let m = self.control_points[0].len() - 1;

        let span_u = self.u_knots.find_knot_span_index(n, self.u_degree, u);
        let span_v = self.v_knots.find_knot_span_index(m, self.v_degree, v);

        // partials beyond a direction's degree vanish, clamp per direction
        let du = order.min(self.u_degree);
        let dv = order.min(self.v_degree);
        let uders = self
            .u_knots
            .derivative_basis_functions(span_u, u, self.u_degree, du)?;
        let vders = self
            .v_knots
            .derivative_basis_functions(span_v, v, self.v_degree, dv)?;

        let mut skl = vec![vec![Vector4::zeros(); order + 1]; order + 1];
        let mut temp = vec![Vector4::zeros(); self.v_degree + 1];

        for k in 0..=du {
            for s in 0..=self.v_degree {
                temp[s] = Vector4::zeros();
                for r in 0..=self.u_degree {
                    temp[s] += self.homogeneous_control_point(
                        span_u - self.u_degree + r,
                        span_v - self.v_degree + s,
                    ) * uders[k][r];
                }
            }

            for l in 0..=(order - k).min(dv) {
                for s in 0..=self.v_degree {
                    skl[k][l] += temp[s] * vders[l][s];
                }
            }
        }

        Ok(skl)
    }

    pub fn u_degree(&self) -> usize {
        self.u_degree
    }

    pub fn v_degree(&self) -> usize {
        self.v_degree
    }

    pub fn u_knots(&self) -> &KnotVector<T> {
        &self.u_knots
    }

    pub fn v_knots(&self) -> &KnotVector<T> {
        &self.v_knots
    }

    pub fn u_knots_domain(&self) -> (T, T) {
        self.u_knots.domain(self.u_degree)
    }

    pub fn v_knots_domain(&self) -> (T, T) {
        self.v_knots.domain(self.v_degree)
    }

    pub fn control_points(&self) -> &Vec<Vec<Point3<T>>> {
        &self.control_points
    }

    pub fn weights(&self) -> Option<&Vec<Vec<T>>> {
        self.weights.as_ref()
    }

    pub fn is_rational(&self) -> bool {
        self.weights.is_some()
    }

    /// Cast the surface to another floating point type
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> NurbsSurface<F> {
        NurbsSurface {
            u_degree: self.u_degree,
            v_degree: self.v_degree,
            u_knots: self.u_knots.cast(),
            v_knots: self.v_knots.cast(),
            control_points: self
                .control_points
                .iter()
                .map(|row| row.iter().map(|p| p.cast()).collect())
                .collect(),
            weights: self.weights.as_ref().map(|w| {
                w.iter()
                    .map(|row| row.iter().map(|wi| convert(*wi)).collect())
                    .collect()
            }),
        }
    }
}

/// Convert homogeneous surface derivatives into Euclidean ones with the
/// two-parameter quotient-rule recursion, nested binomial sums first over l
/// and then over k.
fn rational_derivatives<T: FloatingPoint>(
    ders: &[Vec<Vector4<T>>],
    order: usize,
) -> Vec<Vec<Vector3<T>>> {
    let a_ders: Vec<Vec<Vector3<T>>> = ders
        .iter()
        .map(|row| row.iter().map(|d| d.xyz()).collect())
        .collect();
    let w_ders: Vec<Vec<T>> = ders
        .iter()
        .map(|row| row.iter().map(|d| d.w).collect())
        .collect();

    let mut skl: Vec<Vec<Vector3<T>>> = vec![];
    let mut binom = Binomial::<T>::new();

    for k in 0..=order {
        let mut row: Vec<Vector3<T>> = vec![];

        for l in 0..=(order - k) {
            let mut v = a_ders[k][l];
            for j in 1..=l {
                let coef = binom.get(l, j) * w_ders[0][j];
                v -= row[l - j] * coef;
            }

            for i in 1..=k {
                let coef = binom.get(k, i);
                v -= skl[k - i][l] * (coef * w_ders[i][0]);
                let mut v2 = Vector3::zeros();
                for j in 1..=l {
                    v2 += skl[k - i][l - j] * (binom.get(l, j) * w_ders[i][j]);
                }
                v -= v2 * coef;
            }

            row.push(v / w_ders[0][0]);
        }

        skl.push(row);
    }

    skl
}
