/// Forwards operator traits on a single-field tuple newtype to the wrapped value.
///
/// ```ignore
/// op!(Money => binary [Add::add, Sub::sub] assign [AddAssign::add_assign] unary [Neg::neg]);
/// ```
#[macro_export]
macro_rules! op {
    ($t:ident => binary [$($bin:ident::$bin_fn:ident),*] assign [$($asg:ident::$asg_fn:ident),*]
        unary [$($un:ident::$un_fn:ident),*]) => {
        $(
            impl $bin for $t {
                type Output = $t;

                fn $bin_fn(self, rhs: $t) -> $t {
                    $t(self.0.$bin_fn(rhs.0))
                }
            }
        )*
        $(
            impl $asg for $t {
                fn $asg_fn(&mut self, rhs: $t) {
                    self.0.$asg_fn(rhs.0);
                }
            }
        )*
        $(
            impl $un for $t {
                type Output = $t;

                fn $un_fn(self) -> $t {
                    $t(self.0.$un_fn())
                }
            }
        )*
    };
}
