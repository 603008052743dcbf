//! OBJ text generation.

const CUBE_POSITIONS: &str = "\
v -1 -1 -1
v 1 -1 -1
v 1 1 -1
v -1 1 -1
v -1 -1 1
v 1 -1 1
v 1 1 1
v -1 1 1
vn 0 0 -1
vn 0 0 1
vn 0 -1 0
vn 0 1 0
vn -1 0 0
vn 1 0 0
";

/// Quads of the cube as (position indices, normal index), counter clockwise
const CUBE_QUADS: [([u32; 4], u32); 6] = [
    ([1, 4, 3, 2], 1),
    ([5, 6, 7, 8], 2),
    ([1, 2, 6, 5], 3),
    ([4, 8, 7, 3], 4),
    ([1, 5, 8, 4], 5),
    ([2, 3, 7, 6], 6),
];

/// Hard edged cube, one quad per side, the top side in material `top`
pub fn cube_obj() -> String {
    let mut obj = String::from(CUBE_POSITIONS);
    for (side, (quad, normal)) in CUBE_QUADS.iter().enumerate() {
        obj.push_str(if side == 3 { "usemtl top\n" } else { "usemtl side\n" });
        obj.push('f');
        for v in quad {
            obj.push_str(&format!(" {v}//{normal}"));
        }
        obj.push('\n');
    }
    obj
}

/// Hard edged cube written as 12 separate triangles (36 corners)
pub fn triangulated_cube_obj() -> String {
    let mut obj = String::from(CUBE_POSITIONS);
    obj.push_str("usemtl cube\n");
    for (quad, normal) in CUBE_QUADS {
        for [a, b, c] in [[0, 1, 2], [0, 2, 3]] {
            obj.push_str(&format!(
                "f {}//{normal} {}//{normal} {}//{normal}\n",
                quad[a], quad[b], quad[c]
            ));
        }
    }
    obj
}
